use crate::cli::load_library;
use crate::core::launcher::LauncherSession;
use crate::core::models::Game;
use crate::utils::output;
use crate::utils::output::OutputFormat;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
use std::sync::Mutex;

#[cfg(not(test))]
fn emit_games(games: &[Game], format: &OutputFormat) {
    output::print_games(games, format);
}

#[cfg(test)]
pub static SCANNED_GAMES: Lazy<Mutex<Vec<Vec<Game>>>> = Lazy::new(|| Mutex::new(Vec::new()));

#[cfg(test)]
fn emit_games(games: &[Game], _format: &OutputFormat) {
    SCANNED_GAMES.lock().unwrap().push(games.to_vec());
}

pub fn execute(session: &LauncherSession, format: &OutputFormat) {
    let settings = session.settings();
    log::debug!("scan command: games={}", settings.games_directory);
    if matches!(format, OutputFormat::Normal) {
        println!("🔎 Scanning '{}'", settings.games_directory);
    }

    load_library(session);
    let validation = session.games_validation();
    if !validation.is_valid {
        eprintln!("❌ {}", validation.message);
        return;
    }
    if let Some(status) = session.status_message() {
        if status.starts_with("Scan failed") {
            eprintln!("❌ {}", status);
            return;
        }
    }
    emit_games(&session.games(), format);
    session.store().flush();
}
