use std::path::Path;

use serde::Serialize;

use crate::core::models::EmulatorPaths;
use crate::utils::emulator_paths;

/// Outcome of checking one configured directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
}

impl ValidationResult {
    pub fn valid(msg: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            message: msg.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: msg.into(),
        }
    }
}

/// Check the configured Ryujinx location.
///
/// An empty setting still succeeds when `Ryujinx` is on `PATH`.
pub fn validate_emulator(directory: &str) -> (ValidationResult, Option<EmulatorPaths>) {
    let directory = directory.trim();
    match emulator_paths::resolve(Path::new(directory)) {
        Some(paths) => (ValidationResult::valid("Ryujinx found"), Some(paths)),
        None if directory.is_empty() => (ValidationResult::invalid("Select Ryujinx directory"), None),
        None => (ValidationResult::invalid("Ryujinx executable not found"), None),
    }
}

pub fn validate_games_directory(directory: &str) -> ValidationResult {
    let directory = directory.trim();
    if directory.is_empty() {
        return ValidationResult::invalid("Select games directory");
    }
    if Path::new(directory).is_dir() {
        ValidationResult::valid("Games directory found")
    } else {
        ValidationResult::invalid("Invalid games directory")
    }
}
