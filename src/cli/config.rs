use crate::cli::wait_for_scan;
use crate::core::launcher::LauncherSession;
use crate::utils::validation::ValidationResult;

/// Shows the configured directories, or updates the given ones in place.
///
/// Changing a directory saves the settings, revalidates it and rescans.
pub fn execute(session: &LauncherSession, ryujinx: Option<String>, games: Option<String>) {
    log::debug!("config command: ryujinx={:?} games={:?}", ryujinx, games);

    if ryujinx.is_none() && games.is_none() {
        let settings = session.settings();
        println!("No configuration changes specified.");
        println!("ryujinx_directory={}", settings.ryujinx_directory);
        println!("games_directory={}", settings.games_directory);
        if let Some(path) = session.settings_path() {
            println!("settings_file={}", path.display());
        }
        println!("shared_state={}", session.store().snapshot_path().display());
        println!("cover_cache={}", session.thumbnails().cache().dir().display());
        return;
    }

    session.validate_emulator();
    session.validate_games_directory();
    if let Some(dir) = ryujinx {
        session.set_ryujinx_directory(&dir);
        report(&session.ryujinx_validation());
    }
    if let Some(dir) = games {
        session.set_games_directory(&dir);
        report(&session.games_validation());
    }
    wait_for_scan(session);

    if let Some(status) = session.status_message() {
        println!("{}", status);
    }
    match session.settings_path() {
        Some(path) => println!("Updated {}", path.display()),
        None => println!("⚠️  No settings file, changes last for this session only"),
    }
    session.store().flush();
}

fn report(result: &ValidationResult) {
    if result.is_valid {
        println!("✅ {}", result.message);
    } else {
        println!("⚠️  {}", result.message);
    }
}
