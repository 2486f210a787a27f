//! Data models used throughout the application.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::title::is_valid_title_id;

/// Playtime information Ryujinx records for one title.
#[derive(Clone, Debug, PartialEq)]
pub struct GameMetadata {
    /// Uppercase 16 character title id
    pub title_id: String,

    /// Title as shown by Ryujinx, may be empty
    pub title: String,

    /// Total hours played
    pub hours_played: f64,

    /// Last time the title was played
    pub last_played: Option<DateTime<Utc>>,
}

/// A game file resolved against Ryujinx metadata.
///
/// Identity is the file path: two files sharing a title id never both
/// survive a scan, but files without a title id are always kept.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Game {
    /// The absolute path of the game file, as a string
    id: String,

    /// Display title
    title: String,

    /// Uppercase title id, if one could be resolved
    title_id: Option<String>,

    /// The game file
    file_path: PathBuf,

    /// Total hours played
    hours_played: f64,

    /// Last time the game was played
    last_played: Option<DateTime<Utc>>,
}

impl Game {
    /// Creates a new Game with validation.
    pub fn new(
        file_path: PathBuf,
        title: String,
        title_id: Option<String>,
        hours_played: f64,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let title_id = match title_id {
            Some(id) if !is_valid_title_id(&id) => return Err(Error::InvalidTitleId(id)),
            Some(id) => Some(id.to_ascii_uppercase()),
            None => None,
        };

        if title.trim().is_empty() {
            return Err(Error::Parse(format!(
                "Empty title for {}",
                file_path.display()
            )));
        }

        Ok(Self {
            id: file_path.to_string_lossy().into_owned(),
            title,
            title_id,
            file_path,
            hours_played: hours_played.max(0.0),
            last_played,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn title_id(&self) -> Option<&str> {
        self.title_id.as_deref()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn hours_played(&self) -> f64 {
        self.hours_played
    }

    pub fn last_played(&self) -> Option<DateTime<Utc>> {
        self.last_played
    }

    /// Key used for cover art: the title id when known, else the title.
    pub fn thumbnail_key(&self) -> String {
        thumbnail_key(self.title_id(), &self.title)
    }

    /// Playtime formatted as `"12.3 hrs"`.
    pub fn formatted_hours_played(&self) -> String {
        if self.hours_played <= 0.01 {
            "0.0 hrs".to_string()
        } else {
            format!("{:.1} hrs", self.hours_played)
        }
    }

    /// Last played time relative to `now`, e.g. `"3 days ago"`.
    pub fn formatted_last_played(&self, now: DateTime<Utc>) -> Option<String> {
        self.last_played.map(|lp| format_relative(lp, now))
    }

    /// Checks if the game file is still on disk.
    pub fn file_exists(&self) -> bool {
        self.file_path.is_file()
    }
}

pub fn thumbnail_key(title_id: Option<&str>, title: &str) -> String {
    title_id.unwrap_or(title).to_string()
}

fn format_relative(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 0 {
        return "in the future".to_string();
    }
    let (amount, unit) = match secs {
        0..=59 => return "just now".to_string(),
        60..=3_599 => (secs / 60, "min"),
        3_600..=86_399 => (secs / 3_600, "hr"),
        86_400..=604_799 => (secs / 86_400, "day"),
        604_800..=2_591_999 => (secs / 604_800, "wk"),
        2_592_000..=31_535_999 => (secs / 2_592_000, "mo"),
        _ => (secs / 31_536_000, "yr"),
    };
    let plural = if amount == 1 || unit == "min" || unit == "hr" { "" } else { "s" };
    format!("{} {}{} ago", amount, unit, plural)
}

/// Which stream a console line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    Stdout,
    Stderr,
    System,
}

/// One chunk of output shown in the launcher console.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConsoleLine {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub stream: ConsoleStream,
}

impl ConsoleLine {
    pub fn new(text: impl Into<String>, stream: ConsoleStream) -> Self {
        Self {
            timestamp: Utc::now(),
            text: text.into(),
            stream,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(text, ConsoleStream::System)
    }
}

/// Locations of a Ryujinx installation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmulatorPaths {
    /// The Ryujinx binary
    pub executable: PathBuf,

    /// The directory holding `Config.json` and the `games` metadata folder
    pub data_dir: Option<PathBuf>,
}
