use std::io::{self, BufRead, Write};
use std::thread::JoinHandle;

use chrono::Utc;

use crate::cli::{load_library, print_console_line, wait_for_scan};
use crate::core::launcher::LauncherSession;

const HELP: &str = "n: next · p: previous · enter: launch · a: art · c: clear console · r: rescan · q: quit";

/// Steps through the library from the terminal, one command per line.
pub fn execute(session: &LauncherSession) {
    session.set_console_observer(print_console_line);
    load_library(session);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if let Err(e) = browse(session, stdin.lock(), &mut stdout) {
        eprintln!("❌ Error: {}", e);
    }
    session.store().flush();
}

pub fn browse<R: BufRead, W: Write>(session: &LauncherSession, input: R, out: &mut W) -> io::Result<()> {
    if session.games().is_empty() {
        writeln!(out, "❌ No games to browse")?;
        return Ok(());
    }
    writeln!(out, "{}", HELP)?;
    let mut fetches: Vec<JoinHandle<()>> = session.refresh_art().into_iter().collect();
    show_selected(session, out)?;

    for line in input.lines() {
        let line = line?;
        match line.trim() {
            "n" | "next" => {
                session.select_next();
                fetches.extend(session.refresh_art());
                show_selected(session, out)?;
            }
            "p" | "prev" | "previous" => {
                session.select_previous();
                fetches.extend(session.refresh_art());
                show_selected(session, out)?;
            }
            "" | "l" | "launch" => {
                if !session.can_launch() {
                    writeln!(out, "❌ Launch conditions not met. Check paths in Settings.")?;
                } else if session.launch_selected() {
                    session.wait_for_exit();
                }
            }
            "a" | "art" => {
                join_all(&mut fetches);
                show_art(session, out)?;
            }
            "c" | "clear" => {
                session.clear_console();
                writeln!(out, "🧹 Console cleared")?;
            }
            "r" | "rescan" => {
                session.scan(true);
                wait_for_scan(session);
                if let Some(status) = session.status_message() {
                    writeln!(out, "{}", status)?;
                }
                fetches.extend(session.refresh_art());
                show_selected(session, out)?;
            }
            "q" | "quit" => break,
            other => writeln!(out, "Unknown command '{}'. {}", other, HELP)?,
        }
    }
    join_all(&mut fetches);
    Ok(())
}

/// Lets in-flight art fetches finish writing the cache.
fn join_all(fetches: &mut Vec<JoinHandle<()>>) {
    for handle in fetches.drain(..) {
        if handle.join().is_err() {
            log::error!("Art thread panicked");
        }
    }
}

fn show_selected<W: Write>(session: &LauncherSession, out: &mut W) -> io::Result<()> {
    let games = session.games();
    let Some(game) = session.selected_game() else {
        return writeln!(out, "❌ No game selected");
    };
    let position = games.iter().position(|g| g.id() == game.id()).unwrap_or(0) + 1;
    write!(
        out,
        "🎮 [{}/{}] {} · {}",
        position,
        games.len(),
        game.title(),
        game.formatted_hours_played()
    )?;
    match game.formatted_last_played(Utc::now()) {
        Some(last) => writeln!(out, " · last played {}", last),
        None => writeln!(out),
    }
}

fn show_art<W: Write>(session: &LauncherSession, out: &mut W) -> io::Result<()> {
    let art = session.art();
    let Some(game) = session.selected_game().filter(|g| art.game_id.as_deref() == Some(g.id())) else {
        return writeln!(out, "❌ Art is still loading");
    };
    match &art.cover {
        Some(cover) => writeln!(out, "🖼  Cover for {}: {}x{}", game.title(), cover.width(), cover.height())?,
        None => writeln!(out, "❌ No cover for {}", game.title())?,
    }
    match &art.background {
        Some(background) => writeln!(
            out,
            "🖼  Background for {}: {}x{}",
            game.title(),
            background.width(),
            background.height()
        ),
        None => writeln!(out, "❌ No background for {}", game.title()),
    }
}
