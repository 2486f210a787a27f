//! Launcher state shared with companion processes.
//!
//! The snapshot lives in a single JSON file inside the app group container.
//! Companions (widgets, share extension, intents, the `queue` command) only
//! read it, or write a pending launch request that the main session later
//! consumes. Within one process every read-modify-write goes through a
//! single worker thread, so mutations are applied strictly in FIFO order.
//! Across processes the last write wins; writers touch disjoint fields in
//! practice and each write atomically replaces the whole file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::models::{thumbnail_key, Game};

pub const APP_GROUP_ID: &str = "group.com.ryjinx.launcher";
const SNAPSHOT_FILE: &str = "launcher_snapshot.json";
const THUMBNAIL_DIR: &str = "thumbnails";
pub const THUMBNAIL_EXTENSIONS: [&str; 3] = ["jpg", "png", "webp"];

/// Lightweight game entry readable by companion processes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedGameRecord {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_id: Option<String>,
    pub hours_played: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_played: Option<DateTime<Utc>>,
    pub thumbnail_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl From<&Game> for SharedGameRecord {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id().to_string(),
            title: game.title().to_string(),
            title_id: game.title_id().map(str::to_string),
            hours_played: game.hours_played(),
            last_played: game.last_played(),
            thumbnail_key: game.thumbnail_key(),
            file_path: Some(game.file_path().to_string_lossy().into_owned()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedSnapshot {
    pub games: Vec<SharedGameRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_launched_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_launched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_launch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_launch_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ryujinx_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub games_valid: Option<bool>,
}

impl SharedSnapshot {
    /// Encodes the snapshot as pretty JSON with keys in sorted order.
    pub fn to_json(&self) -> serde_json::Result<String> {
        // serde_json maps are ordered, so routing through a Value sorts keys at every level
        let value = serde_json::to_value(self)?;
        serde_json::to_string_pretty(&value)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    /// The game shown as "recently played": the last launched one if it is
    /// still known, otherwise the one with the latest play time.
    pub fn recent_game(&self) -> Option<&SharedGameRecord> {
        if let Some(last_id) = &self.last_launched_id {
            if let Some(game) = self.games.iter().find(|g| &g.id == last_id) {
                return Some(game);
            }
        }
        self.games
            .iter()
            .filter(|g| g.last_played.is_some())
            .max_by_key(|g| g.last_played)
            .or_else(|| self.games.first())
    }

    /// Games sorted by playtime, most played first.
    pub fn top_played(&self, limit: usize) -> Vec<&SharedGameRecord> {
        let mut games: Vec<&SharedGameRecord> = self.games.iter().collect();
        games.sort_by(|a, b| b.hours_played.total_cmp(&a.hours_played));
        games.truncate(limit);
        games
    }
}

/// A launch request left by a companion process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingLaunch {
    pub id: Option<String>,
    pub path: Option<String>,
}

impl PendingLaunch {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.path.is_none()
    }
}

type Observer = Box<dyn Fn() + Send>;
type Job = Box<dyn FnOnce(&mut Worker) + Send>;

struct Worker {
    snapshot_path: PathBuf,
    observers: Vec<Observer>,
}

impl Worker {
    fn load(&self) -> Option<SharedSnapshot> {
        read_snapshot(&self.snapshot_path)
    }

    fn load_or_default(&self) -> SharedSnapshot {
        self.load().unwrap_or_default()
    }

    fn save(&self, snapshot: &SharedSnapshot) {
        match write_snapshot(&self.snapshot_path, snapshot) {
            Ok(()) => {
                for observer in &self.observers {
                    observer();
                }
            }
            Err(e) => log::warn!(
                "Failed to write shared snapshot {}: {}",
                self.snapshot_path.display(),
                e
            ),
        }
    }
}

/// Reads the snapshot at `path`. Missing or corrupt files read as `None`.
pub fn read_snapshot(path: &Path) -> Option<SharedSnapshot> {
    let data = fs::read_to_string(path).ok()?;
    match SharedSnapshot::from_json(&data) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            log::debug!("Ignoring corrupt snapshot {}: {}", path.display(), e);
            None
        }
    }
}

/// Writes the snapshot through a temporary sibling file and a rename, so
/// readers in other processes never observe a partially written file.
fn write_snapshot(path: &Path, snapshot: &SharedSnapshot) -> crate::error::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = snapshot.to_json()?;
    let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
    fs::write(&tmp, json)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Default location of the shared container.
pub fn default_container_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs_next::home_dir().map(|h| h.join("Library/Group Containers").join(APP_GROUP_ID))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs_next::data_local_dir().map(|d| d.join(APP_GROUP_ID))
    }
}

struct StoreInner {
    root: PathBuf,
    queue: Mutex<Option<Sender<Job>>>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        // closing the channel lets the worker drain queued writes and exit
        self.queue
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Shared store worker panicked");
            }
        }
    }
}

/// File-backed store for the [`SharedSnapshot`].
///
/// Cloning is cheap and every clone feeds the same serial queue.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<StoreInner>,
}

impl SharedStore {
    /// Creates a store rooted at the given container directory.
    pub fn new(root: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let mut worker = Worker {
            snapshot_path: root.join(SNAPSHOT_FILE),
            observers: Vec::new(),
        };

        let handle = thread::Builder::new()
            .name("shared-store".to_string())
            .spawn(move || {
                for job in rx {
                    job(&mut worker);
                }
            });

        let worker = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to start shared store worker: {}", e);
                None
            }
        };

        Self {
            inner: Arc::new(StoreInner {
                root,
                queue: Mutex::new(worker.as_ref().map(|_| tx)),
                worker,
            }),
        }
    }

    /// Opens the store in the default shared container.
    pub fn open_default() -> Option<Self> {
        default_container_dir().map(Self::new)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.inner.root.join(SNAPSHOT_FILE)
    }

    fn submit(&self, job: impl FnOnce(&mut Worker) + Send + 'static) {
        let queue = self.inner.queue.lock().unwrap_or_else(PoisonError::into_inner);
        match queue.as_ref() {
            Some(tx) => {
                if tx.send(Box::new(job)).is_err() {
                    log::error!("Shared store worker is gone, dropping update");
                }
            }
            None => log::error!("Shared store worker not running, dropping update"),
        }
    }

    fn submit_sync<R: Send + 'static>(
        &self,
        job: impl FnOnce(&mut Worker) -> R + Send + 'static,
    ) -> Option<R> {
        let (tx, rx) = mpsc::channel();
        self.submit(move |worker| {
            let _ = tx.send(job(worker));
        });
        rx.recv().ok()
    }

    /// Queues a read-modify-write of the snapshot. A missing snapshot starts from empty.
    pub fn mutate(&self, transform: impl FnOnce(&mut SharedSnapshot) + Send + 'static) {
        self.submit(move |worker| {
            let mut snapshot = worker.load_or_default();
            transform(&mut snapshot);
            worker.save(&snapshot);
        });
    }

    /// Replaces the game list, keeping previously recorded play times.
    ///
    /// A stored last-played time only moves forward: the later of the stored
    /// and incoming values wins, so a launch recorded by `mark_launched`
    /// survives a rescan with older metadata.
    pub fn update_games(&self, games: Vec<SharedGameRecord>) {
        self.mutate(move |snapshot| {
            snapshot.games = merge_games(&snapshot.games, games);
        });
    }

    pub fn update_games_from_library(&self, games: &[Game]) {
        self.update_games(games.iter().map(SharedGameRecord::from).collect());
    }

    /// Records a launch: stamps the game's last played time and the
    /// top-level last launched fields, appending the game if it is unknown.
    pub fn mark_launched(&self, record: SharedGameRecord) {
        self.mutate(move |snapshot| {
            let now = Utc::now();
            snapshot.last_launched_id = Some(record.id.clone());
            snapshot.last_launched_at = Some(now);

            match snapshot.games.iter_mut().find(|g| g.id == record.id) {
                Some(existing) => {
                    let file_path = record.file_path.or_else(|| existing.file_path.take());
                    *existing = SharedGameRecord {
                        last_played: Some(now),
                        file_path,
                        ..record
                    };
                }
                None => snapshot.games.push(SharedGameRecord {
                    last_played: Some(now),
                    ..record
                }),
            }
        });
    }

    pub fn mark_launched_game(&self, game: &Game) {
        self.mark_launched(SharedGameRecord::from(game));
    }

    /// Requests a launch of a known game. Clears any pending path request.
    pub fn set_pending_launch_id(&self, id: impl Into<String>) {
        let id = id.into();
        self.mutate(move |snapshot| {
            snapshot.pending_launch_id = Some(id);
            snapshot.pending_launch_path = None;
        });
    }

    /// Requests a launch of a raw file path. Clears any pending id request.
    pub fn set_pending_launch_path(&self, path: impl Into<String>) {
        let path = path.into();
        self.mutate(move |snapshot| {
            snapshot.pending_launch_path = Some(path);
            snapshot.pending_launch_id = None;
        });
    }

    /// Takes the pending launch request, clearing it in the same queued cycle.
    pub fn consume_pending_launch(&self) -> PendingLaunch {
        self.submit_sync(|worker| {
            let Some(mut snapshot) = worker.load() else {
                return PendingLaunch::default();
            };
            let pending = PendingLaunch {
                id: snapshot.pending_launch_id.take(),
                path: snapshot.pending_launch_path.take(),
            };
            if !pending.is_empty() {
                worker.save(&snapshot);
            }
            pending
        })
        .unwrap_or_default()
    }

    pub fn update_validation(&self, ryujinx_valid: bool, games_valid: bool) {
        self.mutate(move |snapshot| {
            snapshot.ryujinx_valid = Some(ryujinx_valid);
            snapshot.games_valid = Some(games_valid);
        });
    }

    /// Reads the snapshot after every previously queued mutation has been applied.
    pub fn load_snapshot(&self) -> Option<SharedSnapshot> {
        self.submit_sync(|worker| worker.load()).flatten()
    }

    /// Blocks until all queued mutations have been written.
    pub fn flush(&self) {
        self.submit_sync(|_| ());
    }

    /// Registers a callback run after each successful write.
    pub fn subscribe(&self, observer: impl Fn() + Send + 'static) {
        self.submit(move |worker| worker.observers.push(Box::new(observer)));
    }

    pub fn thumbnails(&self) -> SharedThumbnailStore {
        SharedThumbnailStore::new(self.inner.root.join(THUMBNAIL_DIR))
    }
}

/// Merges a fresh scan with the stored records.
///
/// A recorded play time is never lost to a rescan that has none; when both
/// sides know one, the later wins. A record that lost its file path keeps
/// the stored one.
fn merge_games(existing: &[SharedGameRecord], incoming: Vec<SharedGameRecord>) -> Vec<SharedGameRecord> {
    incoming
        .into_iter()
        .map(|mut record| {
            if let Some(old) = existing.iter().find(|g| g.id == record.id) {
                // Last played is the later of the two, and a missing value never clears a stored one.
                record.last_played = match (old.last_played, record.last_played) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
                if record.file_path.is_none() {
                    record.file_path = old.file_path.clone();
                }
            }
            record
        })
        .collect()
}

/// Cover art mirrored into the shared container so companions can show it.
#[derive(Clone, Debug)]
pub struct SharedThumbnailStore {
    dir: PathBuf,
}

impl SharedThumbnailStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn key(title_id: Option<&str>, title: &str) -> String {
        thumbnail_key(title_id, title)
    }

    pub fn store(&self, data: &[u8], key: &str, extension: &str) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            log::warn!("Failed to create {}: {}", self.dir.display(), e);
            return;
        }
        let path = self.dir.join(format!("{}.{}", hash_key(key), extension));
        if let Err(e) = fs::write(&path, data) {
            log::warn!("Failed to store shared thumbnail {}: {}", path.display(), e);
        }
    }

    pub fn image_data(&self, key: &str) -> Option<Vec<u8>> {
        let hashed = hash_key(key);
        THUMBNAIL_EXTENSIONS
            .iter()
            .find_map(|ext| fs::read(self.dir.join(format!("{}.{}", hashed, ext))).ok())
    }

    pub fn clear_all(&self) {
        if self.dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                log::warn!("Failed to clear {}: {}", self.dir.display(), e);
                return;
            }
        }
        let _ = fs::create_dir_all(&self.dir);
    }
}

/// SHA-256 hex digest of a cache key, used as a file name.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
