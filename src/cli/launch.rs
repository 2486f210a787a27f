use std::path::Path;

use crate::cli::{find_game, load_library, print_console_line};
use crate::core::launcher::LauncherSession;

/// Launches `target` and waits for Ryujinx to exit.
pub fn execute(session: &LauncherSession, target: &str) {
    log::debug!("launch command: target={}", target);
    session.set_console_observer(print_console_line);
    load_library(session);

    let games = session.games();
    let launched = match find_game(&games, target) {
        Some(game) => {
            println!("🚀 Launching {}", game.title());
            session.launch_by_id(game.id())
        }
        None if Path::new(target).is_file() => session.launch_by_path(target),
        None => {
            println!("❌ No game matching '{}'", target);
            false
        }
    };

    if launched {
        session.wait_for_exit();
    } else if !session.ryujinx_validation().is_valid {
        eprintln!("❌ {}", session.ryujinx_validation().message);
    }
    session.store().flush();
}
