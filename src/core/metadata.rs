//! Loading of the per-title metadata Ryujinx keeps in its data directory.
//!
//! Ryujinx stores one folder per title under `<data-dir>/games/<title id>`,
//! with playtime information in `gui/metadata.json`. Every failure here is
//! per entry: a missing or broken file only drops that title.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Deserialize;

use crate::core::models::GameMetadata;
use crate::utils::timespan::{parse_timespan_hours, parse_timestamp};
use crate::utils::title::is_valid_title_id;

const METADATA_FILE: &str = "gui/metadata.json";

#[derive(Deserialize)]
struct MetadataFile {
    title: Option<String>,
    timespan_played: Option<String>,
    last_played_utc: Option<String>,
    last_played: Option<String>,
}

/// Loads the metadata of every title found under `<data_dir>/games`.
///
/// Returns a map keyed by uppercase title id. Never fails: without a data
/// directory, or when nothing is readable, the map is empty.
pub fn load_metadata(data_dir: Option<&Path>) -> HashMap<String, GameMetadata> {
    let Some(data_dir) = data_dir else {
        return HashMap::new();
    };

    let games_dir = data_dir.join("games");
    let entries = match fs::read_dir(&games_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("No metadata directory at {}: {}", games_dir.display(), e);
            return HashMap::new();
        }
    };

    let candidates: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !is_valid_title_id(&name) {
                return None;
            }
            Some((name.to_ascii_uppercase(), e.path()))
        })
        .collect();

    let metadata: HashMap<String, GameMetadata> = candidates
        .par_iter()
        .filter_map(|(title_id, dir)| {
            read_metadata_file(title_id, &dir.join(METADATA_FILE)).map(|m| (title_id.clone(), m))
        })
        .collect();

    log::debug!(
        "Loaded metadata for {} titles from {}",
        metadata.len(),
        games_dir.display()
    );
    metadata
}

fn read_metadata_file(title_id: &str, path: &Path) -> Option<GameMetadata> {
    let contents = fs::read_to_string(path).ok()?;
    let file: MetadataFile = match serde_json::from_str(&contents) {
        Ok(file) => file,
        Err(e) => {
            log::warn!("Skipping unreadable metadata {}: {}", path.display(), e);
            return None;
        }
    };

    let title = file.title.map(|t| t.trim().to_string()).unwrap_or_default();
    let hours_played = parse_timespan_hours(file.timespan_played.as_deref().unwrap_or("0:00:00"));
    let last_played = parse_timestamp(file.last_played_utc.as_deref().or(file.last_played.as_deref()));

    Some(GameMetadata {
        title_id: title_id.to_string(),
        title,
        hours_played,
        last_played,
    })
}

#[cfg(test)]
pub(crate) fn write_metadata(data_dir: &Path, title_id: &str, json: &str) {
    let dir = data_dir.join("games").join(title_id).join("gui");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("metadata.json"), json).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[test]
    fn test_load_metadata() {
        let dir = tempdir().unwrap();
        write_metadata(
            dir.path(),
            "0100abcdef012345",
            r#"{
                "title": "  Test Game ",
                "timespan_played": "1.02:03:04.500",
                "last_played_utc": "2024-01-02T03:04:05.1234567Z",
                "last_played": "2020-01-01T00:00:00Z",
                "favorite": false
            }"#,
        );

        let metadata = load_metadata(Some(dir.path()));
        assert_eq!(metadata.len(), 1);
        let entry = &metadata["0100ABCDEF012345"];
        assert_eq!(entry.title_id, "0100ABCDEF012345");
        assert_eq!(entry.title, "Test Game");
        assert!((entry.hours_played - 93784.5 / 3600.0).abs() < 1e-9);
        assert_eq!(
            entry.last_played.unwrap().date_naive(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap().date_naive()
        );
    }

    #[test]
    fn test_last_played_fallback_field() {
        let dir = tempdir().unwrap();
        write_metadata(
            dir.path(),
            "0100000000001000",
            r#"{"title": "Old", "last_played": "2021-06-01T12:00:00Z"}"#,
        );

        let metadata = load_metadata(Some(dir.path()));
        let entry = &metadata["0100000000001000"];
        assert_eq!(
            entry.last_played,
            Some(Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(entry.hours_played, 0.0);
    }

    #[test]
    fn test_skips_invalid_entries() {
        let dir = tempdir().unwrap();
        // not a hex id
        write_metadata(dir.path(), "ZZZZZZZZZZZZZZZZ", r#"{"title": "Nope"}"#);
        // broken json
        write_metadata(dir.path(), "0100000000002000", "{ not json");
        // id folder without a metadata file
        fs::create_dir_all(dir.path().join("games/0100000000003000")).unwrap();
        // stray file named like an id
        fs::write(dir.path().join("games/0100000000004000"), "x").unwrap();
        // valid entry with a bad timestamp keeps the rest of its data
        write_metadata(
            dir.path(),
            "0100000000005000",
            r#"{"title": "Good", "timespan_played": "0:30:00", "last_played_utc": "soon"}"#,
        );

        let metadata = load_metadata(Some(dir.path()));
        assert_eq!(metadata.len(), 1);
        let entry = &metadata["0100000000005000"];
        assert_eq!(entry.title, "Good");
        assert!((entry.hours_played - 0.5).abs() < 1e-9);
        assert!(entry.last_played.is_none());
    }

    #[test]
    fn test_missing_data_dir() {
        assert!(load_metadata(None).is_empty());
        let dir = tempdir().unwrap();
        assert!(load_metadata(Some(&dir.path().join("missing"))).is_empty());
    }
}
