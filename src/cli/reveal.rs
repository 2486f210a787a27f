use crate::cli::{find_game, load_library};
use crate::core::launcher::LauncherSession;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
use std::sync::Mutex;

#[cfg(not(test))]
fn open_path(path: &std::path::Path) -> std::io::Result<()> {
    open::that(path)
}

#[cfg(test)]
pub static OPENED_PATHS: Lazy<Mutex<Vec<std::path::PathBuf>>> =
    Lazy::new(|| Mutex::new(Vec::new()));
#[cfg(test)]
fn open_path(path: &std::path::Path) -> std::io::Result<()> {
    OPENED_PATHS.lock().unwrap().push(path.to_path_buf());
    Ok(())
}

pub fn execute(session: &LauncherSession, target: &str) {
    log::debug!("reveal command: target={}", target);
    load_library(session);

    let games = session.games();
    let Some(game) = find_game(&games, target) else {
        println!("❌ No game matching '{}'", target);
        return;
    };
    let Some(folder) = game.file_path().parent() else {
        println!("❌ {} has no parent folder", game.file_path().display());
        return;
    };

    println!("🗂  Opening folder: {}", folder.display());
    if let Err(e) = open_path(folder) {
        eprintln!("❌ Failed to open folder: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{setup_session, TEST_MUTEX};

    #[test]
    fn test_reveal_opens_containing_folder() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let (dir, session) = setup_session(&[]);
        let nested = dir.path().join("games/rpg");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Quest.xci"), b"").unwrap();

        OPENED_PATHS.lock().unwrap().clear();
        execute(&session, "Quest");

        let opened = OPENED_PATHS.lock().unwrap();
        assert_eq!(opened.as_slice(), &[nested]);
    }

    #[test]
    fn test_reveal_unknown_game() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let (_dir, session) = setup_session(&["a.nsp"]);

        OPENED_PATHS.lock().unwrap().clear();
        execute(&session, "zzz");

        assert!(OPENED_PATHS.lock().unwrap().is_empty());
    }
}
