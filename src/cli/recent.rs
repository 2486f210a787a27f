//! Widget views over the shared snapshot: recently played and top played.

use crate::core::shared_store::{SharedGameRecord, SharedStore};
use crate::utils::output;
use crate::utils::output::OutputFormat;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
use std::sync::Mutex;

#[cfg(not(test))]
fn emit_records(records: &[&SharedGameRecord], format: &OutputFormat) {
    output::print_records(records, format);
}

#[cfg(test)]
pub static EMITTED_RECORDS: Lazy<Mutex<Vec<Vec<String>>>> = Lazy::new(|| Mutex::new(Vec::new()));

#[cfg(test)]
fn emit_records(records: &[&SharedGameRecord], _format: &OutputFormat) {
    EMITTED_RECORDS
        .lock()
        .unwrap()
        .push(records.iter().map(|r| r.title.clone()).collect());
}

pub fn execute_recent(store: &SharedStore, format: &OutputFormat) {
    let snapshot = store.load_snapshot().unwrap_or_default();
    let recent: Vec<&SharedGameRecord> = snapshot.recent_game().into_iter().collect();
    emit_records(&recent, format);
}

pub fn execute_top(store: &SharedStore, limit: usize, format: &OutputFormat) {
    let snapshot = store.load_snapshot().unwrap_or_default();
    emit_records(&snapshot.top_played(limit), format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TEST_MUTEX;
    use tempfile::tempdir;

    fn record(id: &str, hours: f64) -> SharedGameRecord {
        SharedGameRecord {
            id: id.to_string(),
            title: id.to_uppercase(),
            hours_played: hours,
            thumbnail_key: id.to_uppercase(),
            ..SharedGameRecord::default()
        }
    }

    #[test]
    fn test_recent_and_top() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let dir = tempdir().unwrap();
        let store = SharedStore::new(dir.path().to_path_buf());
        store.update_games(vec![record("a", 1.0), record("b", 30.0), record("c", 4.5)]);
        store.mark_launched(record("c", 4.5));

        EMITTED_RECORDS.lock().unwrap().clear();
        execute_recent(&store, &OutputFormat::Plain);
        execute_top(&store, 2, &OutputFormat::Plain);

        let emitted = EMITTED_RECORDS.lock().unwrap();
        assert_eq!(emitted[0], vec!["C"]);
        assert_eq!(emitted[1], vec!["B", "C"]);
    }

    #[test]
    fn test_views_without_snapshot() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let dir = tempdir().unwrap();
        let store = SharedStore::new(dir.path().to_path_buf());

        EMITTED_RECORDS.lock().unwrap().clear();
        execute_recent(&store, &OutputFormat::Normal);
        execute_top(&store, 5, &OutputFormat::Normal);

        let emitted = EMITTED_RECORDS.lock().unwrap();
        assert!(emitted.iter().all(|titles| titles.is_empty()));
    }
}
