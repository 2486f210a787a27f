use clap::{Parser, Subcommand};

use crate::core::models::{ConsoleLine, ConsoleStream, Game};
use crate::core::launcher::LauncherSession;
use crate::utils::title::normalize_title;

pub mod browse;
pub mod clear_cache;
pub mod config;
pub mod launch;
pub mod open_url;
pub mod queue;
pub mod recent;
pub mod reveal;
pub mod run;
pub mod scan;
pub mod thumbnail;
pub mod validate;

/// Ryjinx Launcher CLI
///
/// Scans your Switch games, tracks playtime and launches them in Ryujinx.
/// Run without arguments to start a session: validate the configured
/// directories, scan, and handle any launch queued by a companion.
/// Each command has its own options - use --help with a command to see them.
#[derive(Parser)]
#[command(name = "ryjinx-launcher")]
#[command(about = "Scan, track and launch Switch games in Ryujinx", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the games directory (supports --json, --plain, --delimiter output options)
    Scan {
        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Output in plain format (no formatting or emojis)
        #[arg(long)]
        plain: bool,

        /// Specify custom delimiter for output
        #[arg(long)]
        delimiter: Option<String>,
    },

    /// Launch a game by id, title id, title or file path
    Launch {
        /// The game to launch
        target: String,
    },

    /// Ask a running or future session to launch a game
    Queue {
        /// The game id (its file path as listed by `scan`)
        #[arg(long, conflicts_with = "path", required_unless_present = "path")]
        id: Option<String>,

        /// Path to any game file
        #[arg(long)]
        path: Option<String>,
    },

    /// Show the most recently played game (supports --json, --plain, --delimiter output options)
    Recent {
        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Output in plain format (no formatting or emojis)
        #[arg(long)]
        plain: bool,

        /// Specify custom delimiter for output
        #[arg(long)]
        delimiter: Option<String>,
    },

    /// Show the most played games (supports --json, --plain, --delimiter output options)
    Top {
        /// How many games to show
        #[arg(long, default_value_t = 5)]
        limit: usize,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Output in plain format (no formatting or emojis)
        #[arg(long)]
        plain: bool,

        /// Specify custom delimiter for output
        #[arg(long)]
        delimiter: Option<String>,
    },

    /// Check the configured Ryujinx and games directories (supports --json, --plain, --delimiter output options)
    Validate {
        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Output in plain format (no formatting or emojis)
        #[arg(long)]
        plain: bool,

        /// Specify custom delimiter for output
        #[arg(long)]
        delimiter: Option<String>,
    },

    /// Fetch and cache cover art for a game
    Thumbnail {
        /// The game id, title id or title
        target: String,

        /// Fetch the wide background art instead of the cover
        #[arg(long)]
        background: bool,
    },

    /// Step through the library and launch games from the terminal
    Browse,

    /// Clear cached cover art and rebuild backgrounds
    ClearCache {
        /// Only fetch background art again, keeping cached covers
        #[arg(long)]
        backgrounds: bool,
    },

    /// Show or change the configured directories
    Config {
        /// Directory containing Ryujinx (or the Ryujinx binary / app bundle)
        #[arg(long)]
        ryujinx: Option<String>,

        /// Directory containing your game files
        #[arg(long)]
        games: Option<String>,
    },

    /// Handle a ryjinx:// URL
    OpenUrl {
        /// e.g. ryjinx://launch?id=... or ryjinx://open?settings=1
        url: String,
    },

    /// Open the folder containing a game file
    Reveal {
        /// The game id, title id or title
        target: String,
    },
}

/// Finds a game by id, then title id, then title.
pub fn find_game<'a>(games: &'a [Game], query: &str) -> Option<&'a Game> {
    let query = query.trim();
    let normalized = normalize_title(query);
    games
        .iter()
        .find(|g| g.id() == query)
        .or_else(|| {
            games
                .iter()
                .find(|g| g.title_id().is_some_and(|id| id.eq_ignore_ascii_case(query)))
        })
        .or_else(|| {
            games
                .iter()
                .find(|g| !normalized.is_empty() && normalize_title(g.title()) == normalized)
        })
}

pub fn print_console_line(line: &ConsoleLine) {
    match line.stream {
        ConsoleStream::Stdout => println!("{}", line.text),
        ConsoleStream::Stderr => eprintln!("{}", line.text),
        ConsoleStream::System => println!("▶ {}", line.text),
    }
}

/// Runs the initial validate-and-scan of `session` to completion.
pub fn load_library(session: &LauncherSession) {
    session.start();
    wait_for_scan(session);
}

/// Waits for the scan in flight, if any, and the launch it may have queued up.
pub fn wait_for_scan(session: &LauncherSession) {
    if session.is_scanning() {
        log::debug!("Waiting for the library scan");
        session.wait_for_scan();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn game(path: &str, title: &str, title_id: Option<&str>) -> Game {
        Game::new(
            PathBuf::from(path),
            title.to_string(),
            title_id.map(str::to_string),
            0.0,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_find_game() {
        let games = vec![
            game("/g/zelda.nsp", "The Legend of Zelda", Some("01007EF00011E000")),
            game("/g/mario.xci", "Super Mario Odyssey", None),
        ];

        assert_eq!(find_game(&games, "/g/mario.xci").unwrap().title(), "Super Mario Odyssey");
        assert_eq!(find_game(&games, "01007ef00011e000").unwrap().id(), "/g/zelda.nsp");
        assert_eq!(find_game(&games, "super mario: odyssey").unwrap().id(), "/g/mario.xci");
        assert!(find_game(&games, "metroid").is_none());
        assert!(find_game(&games, "  ").is_none());
    }

    #[test]
    fn test_load_library_waits_for_scan_already_running() {
        let (dir, session) = crate::test_helpers::setup_session(&["a.nsp", "b.nsp", "c.xci"]);
        let games_dir = dir.path().join("games").display().to_string();

        // starts a scan whose handle nobody joins, so the next one coalesces
        drop(session.set_games_directory(&games_dir));
        load_library(&session);

        assert!(!session.is_scanning());
        assert_eq!(session.games().len(), 3);
        assert_eq!(session.status_message().as_deref(), Some("Found 3 games"));
    }

    #[test]
    fn test_cli_parses_queue() {
        let cli = Cli::try_parse_from(["ryjinx-launcher", "queue", "--id", "/g/a.nsp"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Queue { id: Some(_), path: None })));

        assert!(Cli::try_parse_from(["ryjinx-launcher", "queue"]).is_err());
        assert!(Cli::try_parse_from(["ryjinx-launcher", "queue", "--id", "a", "--path", "b"]).is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["ryjinx-launcher", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["ryjinx-launcher", "top"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Top { limit: 5, .. })));

        let cli = Cli::try_parse_from(["ryjinx-launcher", "clear-cache", "--backgrounds"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::ClearCache { backgrounds: true })));
    }
}
