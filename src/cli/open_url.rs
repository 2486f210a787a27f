use crate::cli::{load_library, print_console_line};
use crate::core::launcher::{parse_deep_link, DeepLink, LauncherSession};

pub fn execute(session: &LauncherSession, url: &str) {
    log::debug!("open-url command: url={}", url);
    let link = parse_deep_link(url);
    if link == DeepLink::Ignored {
        println!("❌ Unsupported URL: {}", url);
        return;
    }

    if matches!(link, DeepLink::LaunchId(_) | DeepLink::LaunchPath(_)) {
        session.set_console_observer(print_console_line);
        load_library(session);
    }

    session.handle_deep_link(url);
    if session.settings_requested() {
        let settings = session.settings();
        println!("⚙️  Settings");
        println!("ryujinx_directory={}", settings.ryujinx_directory);
        println!("games_directory={}", settings.games_directory);
    }
    if session.is_launching() {
        session.wait_for_exit();
    }
    session.store().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::setup_session;

    #[test]
    fn test_open_settings_link() {
        let (_dir, session) = setup_session(&[]);
        execute(&session, "ryjinx://open?settings=1");
        assert!(session.settings_requested());
        assert!(session.games().is_empty());
    }

    #[test]
    fn test_launch_link_without_emulator() {
        let (_dir, session) = setup_session(&["a.nsp"]);
        execute(&session, "ryjinx://launch?path=%2Fnowhere%2Fa.nsp");
        let console: Vec<String> = session.console().into_iter().map(|l| l.text).collect();
        assert_eq!(console, vec!["Ryujinx not configured. Open Settings."]);
    }

    #[test]
    fn test_unsupported_url() {
        let (_dir, session) = setup_session(&[]);
        execute(&session, "https://example.com");
        assert!(session.console().is_empty());
        assert!(!session.settings_requested());
    }
}
