use crate::core::models::Game;
use crate::core::shared_store::SharedGameRecord;
use crate::utils::validation::ValidationResult;
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
pub struct GameResult {
    pub id: String,
    pub title: String,
    pub title_id: Option<String>,
    pub hours_played: f64,
    pub last_played: Option<String>,
}

impl From<&Game> for GameResult {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id().to_string(),
            title: game.title().to_string(),
            title_id: game.title_id().map(str::to_string),
            hours_played: game.hours_played(),
            last_played: game.last_played().map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Serialize)]
pub struct ValidationReport<'a> {
    pub ryujinx: &'a ValidationResult,
    pub games: &'a ValidationResult,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Normal,
    Plain,
    Json,
    Delimited(String),
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("❌ Error: {}", e),
    }
}

pub fn print_games(games: &[Game], format: &OutputFormat) {
    match format {
        OutputFormat::Normal => {
            if games.is_empty() {
                println!("❌ No games found");
                return;
            }
            let now = Utc::now();
            for game in games {
                match game.title_id() {
                    Some(id) => println!("🎮 [{}] {}", id, game.title()),
                    None => println!("🎮 {}", game.title()),
                }
                print!("   ⏱  {}", game.formatted_hours_played());
                match game.formatted_last_played(now) {
                    Some(last) => println!(" · last played {}", last),
                    None => println!(),
                }
                println!("   📁 {}", game.file_path().display());
            }
        }
        OutputFormat::Plain => {
            for game in games {
                println!("id={}", game.id());
                println!("title={}", game.title());
                println!("title_id={}", game.title_id().unwrap_or_default());
                println!("hours={:.1}", game.hours_played());
                println!(
                    "last_played={}",
                    game.last_played().map(|t| t.to_rfc3339()).unwrap_or_default()
                );
            }
        }
        OutputFormat::Json => {
            let results: Vec<GameResult> = games.iter().map(GameResult::from).collect();
            print_json(&results);
        }
        OutputFormat::Delimited(delimiter) => {
            for game in games {
                println!("{}", delimited_game(game, delimiter));
            }
        }
    }
}

fn delimited_game(game: &Game, delimiter: &str) -> String {
    [
        game.title_id().unwrap_or_default().to_string(),
        game.title().to_string(),
        format!("{:.1}", game.hours_played()),
        game.id().to_string(),
    ]
    .join(delimiter)
}

/// Prints records taken from the shared snapshot (recent / top played views).
pub fn print_records(records: &[&SharedGameRecord], format: &OutputFormat) {
    match format {
        OutputFormat::Normal => {
            if records.is_empty() {
                println!("❌ No games played yet");
            }
            for (rank, record) in records.iter().enumerate() {
                println!("{}. {} ({:.1} hrs)", rank + 1, record.title, record.hours_played);
            }
        }
        OutputFormat::Plain => {
            for record in records {
                println!("id={}", record.id);
                println!("title={}", record.title);
                println!("hours={:.1}", record.hours_played);
            }
        }
        OutputFormat::Json => print_json(records),
        OutputFormat::Delimited(delimiter) => {
            for record in records {
                println!(
                    "{}{}{}{}{:.1}",
                    record.id, delimiter, record.title, delimiter, record.hours_played
                );
            }
        }
    }
}

pub fn print_validation(ryujinx: &ValidationResult, games: &ValidationResult, format: &OutputFormat) {
    let mark = |r: &ValidationResult| if r.is_valid { "✅" } else { "❌" };
    match format {
        OutputFormat::Normal => {
            println!("{} Ryujinx: {}", mark(ryujinx), ryujinx.message);
            println!("{} Games: {}", mark(games), games.message);
        }
        OutputFormat::Plain => {
            println!("ryujinx_valid={}", ryujinx.is_valid);
            println!("ryujinx_message={}", ryujinx.message);
            println!("games_valid={}", games.is_valid);
            println!("games_message={}", games.message);
        }
        OutputFormat::Json => print_json(&ValidationReport { ryujinx, games }),
        OutputFormat::Delimited(delimiter) => {
            println!("ryujinx{}{}{}{}", delimiter, ryujinx.is_valid, delimiter, ryujinx.message);
            println!("games{}{}{}{}", delimiter, games.is_valid, delimiter, games.message);
        }
    }
}

pub fn determine_format(json: bool, plain: bool, delimiter: &Option<String>) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else if plain {
        OutputFormat::Plain
    } else if let Some(d) = delimiter {
        OutputFormat::Delimited(d.clone())
    } else {
        OutputFormat::Normal
    }
}
