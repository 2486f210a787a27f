use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::emulator_paths;

const SETTINGS_DIR: &str = "ryjinx-launcher";
const SETTINGS_FILE: &str = "settings.json";

/// Persisted user configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ryujinx_directory: String,
    pub games_directory: String,
    pub(crate) background_cache_version: u32,
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Loads from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::warn!("No config directory available, using default settings");
                Self::with_detected_games_directory(Self::default())
            }
        }
    }

    /// Loads from `path`. A missing or corrupt file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        let settings = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt settings {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::debug!("No settings at {}: {}", path.display(), e);
                Self::default()
            }
        };
        Self::with_detected_games_directory(settings)
    }

    fn with_detected_games_directory(mut settings: Self) -> Self {
        if settings.games_directory.is_empty() {
            if let Some(dir) = emulator_paths::auto_detect_games_directory() {
                log::info!("Detected games directory {}", dir.display());
                settings.games_directory = dir.display().to_string();
            }
        }
        settings
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn games_path(&self) -> PathBuf {
        PathBuf::from(self.games_directory.trim())
    }

    /// Version mixed into background cache keys. Never zero.
    pub fn background_cache_version(&self) -> u32 {
        self.background_cache_version.max(1)
    }

    /// Invalidates every cached background by moving to a new key version.
    pub fn bump_background_cache_version(&mut self) -> u32 {
        let next = self.background_cache_version().wrapping_add(1).max(1);
        self.background_cache_version = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{with_home, TEST_MUTEX};
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        let mut settings = Settings {
            ryujinx_directory: "/opt/ryujinx".to_string(),
            games_directory: "/games".to_string(),
            ..Settings::default()
        };
        settings.bump_background_cache_version();
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path), settings);
        assert_eq!(Settings::load_from(&path).background_cache_version(), 2);
    }

    #[test]
    fn test_missing_or_corrupt_file_gives_defaults() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ nope").unwrap();

        with_home(&dir.path().join("home"), || {
            let settings = Settings::load_from(&path);
            assert_eq!(settings.ryujinx_directory, "");
            assert_eq!(settings.games_directory, "");
            assert_eq!(settings.background_cache_version(), 1);

            let settings = Settings::load_from(&dir.path().join("missing.json"));
            assert_eq!(settings, Settings::default());
        });
    }

    #[test]
    fn test_empty_games_directory_is_detected() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let dir = tempdir().unwrap();
        let home = dir.path().join("home");
        let games = home.join("Documents/Emulation/Switch/Games");
        fs::create_dir_all(&games).unwrap();

        with_home(&home, || {
            let settings = Settings::load_from(&dir.path().join("settings.json"));
            assert_eq!(settings.games_directory, games.display().to_string());
        });
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"games_directory": "/mnt/games"}"#).unwrap();
        let settings = Settings::load_from(&path);
        assert_eq!(settings.games_directory, "/mnt/games");
        assert_eq!(settings.ryujinx_directory, "");
    }

    #[test]
    fn test_bump_wraps() {
        let mut settings = Settings {
            background_cache_version: u32::MAX,
            ..Settings::default()
        };
        assert_eq!(settings.bump_background_cache_version(), 1);
        assert_eq!(settings.bump_background_cache_version(), 2);
    }
}
