use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Games directory not found at: {}", .0.display())]
    GamesDirectoryNotFound(PathBuf),

    #[error("Invalid title id: {0}. Title ids are 16 hexadecimal characters.")]
    InvalidTitleId(String),

    #[error("Failed to launch Ryujinx: {0}")]
    Launch(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
