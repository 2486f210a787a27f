use crate::core::launcher::LauncherSession;
use crate::utils::output;
use crate::utils::output::OutputFormat;

pub fn execute(session: &LauncherSession, format: &OutputFormat) {
    log::debug!("validate command");
    let ryujinx = session.validate_emulator();
    let games = session.validate_games_directory();
    output::print_validation(&ryujinx, &games, format);
    session.store().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::setup_session;

    #[test]
    fn test_validate_updates_snapshot() {
        let (_dir, session) = setup_session(&[]);
        execute(&session, &OutputFormat::Plain);

        assert!(session.games_validation().is_valid);
        let snapshot = session.store().load_snapshot().unwrap();
        assert_eq!(snapshot.games_valid, Some(true));
        assert_eq!(snapshot.ryujinx_valid, Some(session.ryujinx_validation().is_valid));
    }
}
