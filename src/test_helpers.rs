use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

use crate::core::launcher::LauncherSession;
use crate::core::shared_store::SharedStore;
use crate::core::thumbnails::ThumbnailService;
use crate::utils::image_cache::ImageCache;
use crate::utils::settings::Settings;

pub static TEST_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Points HOME and XDG_CONFIG_HOME at `home` for the duration of `f`.
/// Callers hold `TEST_MUTEX`.
pub fn with_home<F: FnOnce()>(home: &Path, f: F) {
    let old_home = std::env::var("HOME").ok();
    let old_xdg = std::env::var("XDG_CONFIG_HOME").ok();
    std::env::set_var("HOME", home);
    std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
    f();
    match old_home {
        Some(h) => std::env::set_var("HOME", h),
        None => std::env::remove_var("HOME"),
    }
    match old_xdg {
        Some(x) => std::env::set_var("XDG_CONFIG_HOME", x),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }
}

/// A session rooted in a temp dir whose games directory holds `files`.
///
/// Ryujinx is left unconfigured. The shared store lives in `<tmp>/group`,
/// covers in `<tmp>/covers` and settings in `<tmp>/settings.json`.
pub fn setup_session(files: &[&str]) -> (TempDir, LauncherSession) {
    let dir = tempdir().unwrap();
    let games = dir.path().join("games");
    fs::create_dir_all(&games).unwrap();
    for name in files {
        fs::write(games.join(name), b"").unwrap();
    }

    let settings = Settings {
        games_directory: games.display().to_string(),
        ..Settings::default()
    };
    let store = SharedStore::new(dir.path().join("group"));
    let cache = Arc::new(ImageCache::new(dir.path().join("covers")));
    let thumbnails = Arc::new(ThumbnailService::new(cache, Some(store.thumbnails())));
    let session = LauncherSession::new(
        settings,
        Some(dir.path().join("settings.json")),
        store,
        thumbnails,
    );
    (dir, session)
}
