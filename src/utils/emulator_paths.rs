use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::models::EmulatorPaths;

const EXECUTABLE_NAME: &str = "Ryujinx";
const APP_BUNDLE_NAME: &str = "Ryujinx.app";
const CONFIG_FILE: &str = "Config.json";

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn is_app_bundle(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("app")
}

fn bundle_executable(bundle: &Path) -> PathBuf {
    bundle.join("Contents/MacOS").join(EXECUTABLE_NAME)
}

/// The `.app` bundle an executable lives in, if any.
fn bundle_of(executable: &Path) -> Option<PathBuf> {
    let macos = executable.parent()?;
    let contents = macos.parent()?;
    if macos.file_name()? != "MacOS" || contents.file_name()? != "Contents" {
        return None;
    }
    contents.parent().filter(|p| is_app_bundle(p)).map(Path::to_path_buf)
}

/// Resolve a user-supplied Ryujinx location to its executable and data directory.
///
/// `path` may be the executable itself, an `.app` bundle, or a directory
/// holding either. An empty path falls back to `Ryujinx` on `PATH`.
pub fn resolve(path: &Path) -> Option<EmulatorPaths> {
    if path.as_os_str().is_empty() {
        let found = which::which(EXECUTABLE_NAME).ok()?;
        log::debug!("Found {} on PATH: {}", EXECUTABLE_NAME, found.display());
        return resolve(&found);
    }

    let normalized = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let (executable, bundle) = if normalized.is_dir() {
        let bundle = if is_app_bundle(&normalized) {
            Some(normalized.clone())
        } else {
            Some(normalized.join(APP_BUNDLE_NAME)).filter(|b| b.is_dir())
        };
        let executable = bundle
            .as_deref()
            .map(bundle_executable)
            .filter(|p| is_executable(p))
            .or_else(|| Some(normalized.join(EXECUTABLE_NAME)).filter(|p| is_executable(p)))?;
        (executable, bundle)
    } else if is_executable(&normalized) {
        let bundle = bundle_of(&normalized);
        (normalized, bundle)
    } else {
        log::debug!("No Ryujinx executable at {}", normalized.display());
        return None;
    };

    let data_dir = locate_data_directory(&executable, bundle.as_deref());
    log::debug!(
        "Resolved Ryujinx executable {} (data: {:?})",
        executable.display(),
        data_dir
    );
    Some(EmulatorPaths {
        executable,
        data_dir,
    })
}

fn has_config(dir: &Path) -> bool {
    dir.join(CONFIG_FILE).is_file()
}

/// Candidate data directories in lookup order, deduplicated by canonical path.
fn data_dir_candidates(executable: &Path, bundle: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |dir: PathBuf| {
        let canon = fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
        if seen.insert(canon.clone()) {
            dirs.push(canon);
        }
    };

    let bases = [
        executable.parent().map(Path::to_path_buf),
        bundle.and_then(Path::parent).map(Path::to_path_buf),
    ];
    for base in bases.into_iter().flatten() {
        let portable = base.join("portable");
        if portable.is_dir() {
            push(portable);
        } else if portable.exists() {
            push(base);
        }
    }

    for dir in user_data_dirs() {
        push(dir);
    }
    dirs
}

/// Per-user Ryujinx data directories (not necessarily existing).
fn user_data_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(config) = dirs_next::config_dir() {
        dirs.push(config.join(EXECUTABLE_NAME));
    }
    if let Some(home) = dirs_next::home_dir() {
        let dotconfig = home.join(".config").join(EXECUTABLE_NAME);
        if !dirs.contains(&dotconfig) {
            dirs.push(dotconfig);
        }
    }
    dirs
}

fn locate_data_directory(executable: &Path, bundle: Option<&Path>) -> Option<PathBuf> {
    data_dir_candidates(executable, bundle)
        .into_iter()
        .find(|dir| has_config(dir))
}

#[derive(Deserialize)]
struct EmulatorConfig {
    #[serde(default)]
    game_dirs: Vec<String>,
}

/// First existing directory listed under `game_dirs` in any of `configs`.
fn games_dir_from_configs(configs: &[PathBuf]) -> Option<PathBuf> {
    configs.iter().find_map(|config| {
        let contents = fs::read_to_string(config).ok()?;
        let parsed: EmulatorConfig = match serde_json::from_str(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::debug!("Skipping {}: {}", config.display(), e);
                return None;
            }
        };
        parsed
            .game_dirs
            .iter()
            .map(PathBuf::from)
            .find(|dir| dir.is_dir())
    })
}

/// `<volume>/Emulation/Switch/Games` on the first mounted volume that has one.
fn games_dir_on_volumes(volumes: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(volumes)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .collect();
    entries.sort();
    entries
        .into_iter()
        .map(|volume| volume.join("Emulation/Switch/Games"))
        .find(|dir| dir.is_dir())
}

/// Best guess at where the user keeps their games.
pub fn auto_detect_games_directory() -> Option<PathBuf> {
    let configs: Vec<PathBuf> = user_data_dirs()
        .into_iter()
        .map(|dir| dir.join(CONFIG_FILE))
        .collect();
    if let Some(dir) = games_dir_from_configs(&configs) {
        return Some(dir);
    }
    if let Some(dir) = games_dir_on_volumes(Path::new("/Volumes")) {
        return Some(dir);
    }
    dirs_next::home_dir()
        .map(|home| home.join("Documents/Emulation/Switch/Games"))
        .filter(|dir| dir.is_dir())
}
