//! Game directory scanning.
//!
//! Walks a games directory once, resolves every supported file against the
//! Ryujinx metadata and collapses files that share a title id (base game
//! dumps in several formats, re-dumps) into a single entry.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::{DirEntry, WalkDir};

use crate::core::models::{Game, GameMetadata};
use crate::error::{Error, Result};
use crate::utils::title::{extract_title_id, normalize_title, sanitize_title};

/// File extensions Ryujinx can boot, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 8] = ["xci", "xcz", "nsp", "nsz", "nca", "nro", "nso", "pfs0"];

/// A supported file found during the walk.
#[derive(Clone, Debug)]
pub struct GameFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub title_id: Option<String>,
    pub sanitized_title: String,
}

impl GameFile {
    /// Derives the title id and display title from the file name. A name
    /// that sanitizes to nothing keeps its raw stem as the title.
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sanitized = sanitize_title(&stem);
        Self {
            title_id: extract_title_id(&stem),
            sanitized_title: if sanitized.is_empty() { stem } else { sanitized },
            path,
            size,
            modified,
        }
    }

    fn from_entry(entry: &DirEntry) -> Self {
        let (size, modified) = match entry.metadata() {
            Ok(meta) => (
                meta.len(),
                meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            ),
            Err(e) => {
                log::debug!("Could not stat {}: {}", entry.path().display(), e);
                (0, SystemTime::UNIX_EPOCH)
            }
        };
        Self::new(entry.path().to_path_buf(), size, modified)
    }

    /// Whether this file should replace `other` as the representative of a title id.
    fn supersedes(&self, other: &GameFile) -> bool {
        self.size > other.size || (self.size == other.size && self.modified > other.modified)
    }
}

pub fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Lists every supported game file below `dir`, skipping hidden entries.
pub fn find_game_files(dir: &Path) -> Result<Vec<GameFile>> {
    if !dir.is_dir() {
        return Err(Error::GamesDirectoryNotFound(dir.to_path_buf()));
    }
    // surface permission problems on the root instead of reporting zero games
    fs::read_dir(dir)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_supported_file(entry.path()) {
            files.push(GameFile::from_entry(&entry));
        }
    }

    Ok(files)
}

/// Scans `dir` and resolves the found files into a deduplicated, title-sorted game list.
///
/// # Errors
///
/// Returns an error when `dir` does not exist or cannot be read, so callers
/// can tell a broken directory apart from an empty one.
pub fn scan_games(dir: &Path, metadata: &HashMap<String, GameMetadata>) -> Result<Vec<Game>> {
    let files = find_game_files(dir)?;
    let games = resolve_games(files, metadata);
    log::info!("Found {} games in {}", games.len(), dir.display());
    Ok(games)
}

/// Resolves candidate files into games. Pure, so it can be tested without a filesystem.
pub fn resolve_games(files: Vec<GameFile>, metadata: &HashMap<String, GameMetadata>) -> Vec<Game> {
    let by_title = index_by_title(metadata);

    let mut by_title_id: HashMap<String, (GameFile, Game)> = HashMap::new();
    let mut without_id: Vec<Game> = Vec::new();

    for file in files {
        let mut entry = file.title_id.as_ref().and_then(|id| metadata.get(id));

        let title = match entry {
            Some(m) if !m.title.is_empty() => m.title.clone(),
            _ => {
                if entry.is_none() {
                    entry = by_title.get(&normalize_title(&file.sanitized_title)).copied();
                }
                file.sanitized_title.clone()
            }
        };

        let title_id = file
            .title_id
            .clone()
            .or_else(|| entry.map(|m| m.title_id.clone()));

        let game = match Game::new(
            file.path.clone(),
            title,
            title_id.clone(),
            entry.map(|m| m.hours_played).unwrap_or(0.0),
            entry.and_then(|m| m.last_played),
        ) {
            Ok(game) => game,
            Err(e) => {
                log::warn!("Skipping {}: {}", file.path.display(), e);
                continue;
            }
        };

        match title_id {
            Some(id) => match by_title_id.get(&id) {
                Some((existing, _)) if !file.supersedes(existing) => {
                    log::debug!(
                        "Keeping {} over {} for {}",
                        existing.path.display(),
                        file.path.display(),
                        id
                    );
                }
                _ => {
                    by_title_id.insert(id, (file, game));
                }
            },
            None => without_id.push(game),
        }
    }

    let mut games: Vec<Game> = by_title_id.into_values().map(|(_, game)| game).collect();
    games.extend(without_id);
    sort_by_title(&mut games);
    games
}

fn index_by_title(metadata: &HashMap<String, GameMetadata>) -> HashMap<String, &GameMetadata> {
    let mut entries: Vec<&GameMetadata> = metadata.values().collect();
    entries.sort_by(|a, b| a.title_id.cmp(&b.title_id));

    let mut index = HashMap::new();
    for entry in entries {
        let normalized = normalize_title(&entry.title);
        if !normalized.is_empty() {
            index.entry(normalized).or_insert(entry);
        }
    }
    index
}

/// Sorts games by title, case-insensitively.
pub fn sort_by_title(games: &mut [Game]) {
    games.sort_by(|a, b| {
        a.title()
            .to_lowercase()
            .cmp(&b.title().to_lowercase())
            .then_with(|| a.title().cmp(b.title()))
            .then_with(|| a.id().cmp(b.id()))
    });
}
