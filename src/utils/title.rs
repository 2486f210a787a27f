//! Title identifier and display title helpers.

use once_cell::sync::Lazy;
use regex::Regex;

static TITLE_ID_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{16}").unwrap());
static TITLE_ID_EXACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]{16}$").unwrap());
static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]+\]").unwrap());
static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^\)]+\)").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

/// Returns the first run of 16 hex characters in `file_stem`, uppercased.
pub fn extract_title_id(file_stem: &str) -> Option<String> {
    TITLE_ID_RUN
        .find(file_stem)
        .map(|m| m.as_str().to_ascii_uppercase())
}

/// Checks that `value` is exactly a 16 character hexadecimal title id.
pub fn is_valid_title_id(value: &str) -> bool {
    TITLE_ID_EXACT.is_match(value)
}

/// Turns a file stem such as `Super.Game_Title-[Update][v2]` into `Super Game Title`.
pub fn sanitize_title(file_stem: &str) -> String {
    let result = BRACKETED.replace_all(file_stem, " ");
    let result = PARENTHESIZED.replace_all(&result, " ");
    let result = result.replace(['_', '.', '-'], " ");
    SPACES.replace_all(&result, " ").trim().to_string()
}

/// Lowercases and rejoins the alphanumeric tokens of `value` with single spaces.
///
/// Used to match a sanitized file name against the titles recorded by the
/// emulator when the file carries no title id.
pub fn normalize_title(value: &str) -> String {
    value
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
