//! # Ryjinx Launcher
//!
//! A launcher for the Ryujinx Nintendo Switch emulator.
//!
//! ## Features
//!
//! - Scan a games directory and merge it with Ryujinx playtime metadata
//! - Launch games in Ryujinx and stream its console output
//! - Share the library with companion processes through a snapshot file
//! - Cache cover art from online providers
//!
//! ## Usage
//!
//! Run without arguments to start a session (and run any queued launch):
//!
//! ```text
//! ryjinx-launcher
//! ```
//!
//! List your games:
//!
//! ```text
//! ryjinx-launcher scan
//! ```
//!
//! Launch a game by title, title id or path:
//!
//! ```text
//! ryjinx-launcher launch "Super Mario Odyssey"
//! ```
//!
//! Browse the library and launch from the terminal:
//!
//! ```text
//! ryjinx-launcher browse
//! ```
//!
//! Queue a launch for the next session:
//!
//! ```text
//! ryjinx-launcher queue --path ~/Games/zelda.nsp
//! ```

use clap::Parser;

mod cli;
mod core;
mod error;
mod utils;

#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use crate::core::launcher::LauncherSession;
use crate::core::shared_store::SharedStore;
use utils::output::determine_format;

fn open_session() -> LauncherSession {
    match LauncherSession::open_default() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn open_store() -> SharedStore {
    match SharedStore::open_default() {
        Some(store) => store,
        None => {
            eprintln!("❌ Error: no data directory for the shared store");
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    utils::logging::init(cli.debug);

    match cli.command {
        Some(Commands::Scan { json, plain, delimiter }) => {
            let format = determine_format(json, plain, &delimiter);
            cli::scan::execute(&open_session(), &format);
        }
        Some(Commands::Launch { target }) => {
            cli::launch::execute(&open_session(), &target);
        }
        Some(Commands::Queue { id, path }) => {
            cli::queue::execute(&open_store(), id, path);
        }
        Some(Commands::Recent { json, plain, delimiter }) => {
            let format = determine_format(json, plain, &delimiter);
            cli::recent::execute_recent(&open_store(), &format);
        }
        Some(Commands::Top { limit, json, plain, delimiter }) => {
            let format = determine_format(json, plain, &delimiter);
            cli::recent::execute_top(&open_store(), limit, &format);
        }
        Some(Commands::Validate { json, plain, delimiter }) => {
            let format = determine_format(json, plain, &delimiter);
            cli::validate::execute(&open_session(), &format);
        }
        Some(Commands::Thumbnail { target, background }) => {
            cli::thumbnail::execute(&open_session(), &target, background);
        }
        Some(Commands::Browse) => {
            cli::browse::execute(&open_session());
        }
        Some(Commands::ClearCache { backgrounds }) => {
            cli::clear_cache::execute(&open_session(), backgrounds);
        }
        Some(Commands::Config { ryujinx, games }) => {
            cli::config::execute(&open_session(), ryujinx, games);
        }
        Some(Commands::OpenUrl { url }) => {
            cli::open_url::execute(&open_session(), &url);
        }
        Some(Commands::Reveal { target }) => {
            cli::reveal::execute(&open_session(), &target);
        }
        None => {
            log::info!("Starting launcher session...");
            cli::run::execute(&open_session());
        }
    }
}
