use crate::cli::{load_library, print_console_line};
use crate::core::launcher::LauncherSession;

/// Default session: validate, scan, run any queued launch to completion.
pub fn execute(session: &LauncherSession) {
    session.set_console_observer(print_console_line);
    session
        .store()
        .subscribe(|| log::debug!("Shared state written"));
    load_library(session);

    let ryujinx = session.ryujinx_validation();
    let games = session.games_validation();
    for result in [&ryujinx, &games] {
        if result.is_valid {
            log::info!("{}", result.message);
        } else {
            eprintln!("❌ {}", result.message);
        }
    }
    if let Some(status) = session.status_message() {
        println!("{}", status);
    }

    if session.is_launching() {
        session.wait_for_exit();
    } else if games.is_valid {
        println!("Nothing queued. Use `launch` or `queue` to start a game.");
    }
    session.store().flush();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_helpers::setup_session;
    use std::fs;

    #[test]
    fn test_session_runs_queued_launch() {
        let (dir, session) = setup_session(&[]);
        let games = dir.path().join("games");
        let game = games.join("Queued.nsp");
        fs::write(&game, "exit 4\n").unwrap();
        let install = dir.path().join("ryujinx");
        fs::create_dir_all(&install).unwrap();
        std::os::unix::fs::symlink("/bin/sh", install.join("Ryujinx")).unwrap();
        session.set_ryujinx_directory(&install.display().to_string());
        session.store().set_pending_launch_id(game.display().to_string());

        execute(&session);

        let console: Vec<String> = session.console().into_iter().map(|l| l.text).collect();
        assert_eq!(console, vec!["Launching Queued...", "Ryujinx exited with status 4"]);
        assert!(session.store().consume_pending_launch().is_empty());
    }
}
