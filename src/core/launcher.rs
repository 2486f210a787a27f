//! The launcher session ties settings, scanning, the shared store, cover
//! art and the emulator process together.
//!
//! A session is cheap to clone; clones share the same state. Scans and art
//! fetches run on worker threads and apply their results through a
//! generation check, so a superseded request never overwrites a newer one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use image::DynamicImage;
use url::Url;

use crate::core::metadata::load_metadata;
use crate::core::models::{ConsoleLine, EmulatorPaths, Game};
use crate::core::process::EmulatorProcess;
use crate::core::scanner::scan_games;
use crate::core::shared_store::SharedStore;
use crate::core::thumbnails::{SelectionTracker, ThumbnailService};
use crate::error::{Error, Result};
use crate::utils::image_cache::ImageCache;
use crate::utils::settings::Settings;
use crate::utils::validation::{self, ValidationResult};

pub const DEEP_LINK_SCHEME: &str = "ryjinx";

const COVER_SLOT: &str = "cover";
const BACKGROUND_SLOT: &str = "background";
const COVER_PIXEL_SIZE: u32 = 512;

/// What a `ryjinx://` URL asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeepLink {
    LaunchId(String),
    LaunchPath(String),
    OpenSettings(bool),
    Ignored,
}

/// Parse `ryjinx://launch?id=…`, `ryjinx://launch?path=…` and `ryjinx://open?settings=1`.
pub fn parse_deep_link(url: &str) -> DeepLink {
    let Ok(url) = Url::parse(url) else {
        return DeepLink::Ignored;
    };
    if url.scheme() != DEEP_LINK_SCHEME {
        return DeepLink::Ignored;
    }
    let query = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    match url.host_str().unwrap_or_default() {
        "open" => DeepLink::OpenSettings(query("settings").as_deref() == Some("1")),
        "launch" => {
            if let Some(id) = query("id") {
                DeepLink::LaunchId(id)
            } else if let Some(path) = query("path") {
                DeepLink::LaunchPath(path)
            } else {
                DeepLink::Ignored
            }
        }
        _ => DeepLink::Ignored,
    }
}

/// Art loaded for the selected game.
#[derive(Clone, Default)]
pub struct SelectedArt {
    pub game_id: Option<String>,
    pub cover: Option<Arc<DynamicImage>>,
    pub background: Option<Arc<DynamicImage>>,
}

struct SessionState {
    games: Vec<Game>,
    selected: Option<String>,
    console: Vec<ConsoleLine>,
    is_scanning: bool,
    is_launching: bool,
    launch_generation: u64,
    scan_generation: u64,
    status_message: Option<String>,
    ryujinx_validation: ValidationResult,
    games_validation: ValidationResult,
    emulator: Option<EmulatorPaths>,
    settings_requested: bool,
    art: SelectedArt,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            games: Vec::new(),
            selected: None,
            console: Vec::new(),
            is_scanning: false,
            is_launching: false,
            launch_generation: 0,
            scan_generation: 0,
            status_message: None,
            ryujinx_validation: ValidationResult::invalid("Select Ryujinx directory"),
            games_validation: ValidationResult::invalid("Select games directory"),
            emulator: None,
            settings_requested: false,
            art: SelectedArt::default(),
        }
    }
}

impl SessionState {
    fn selected_game(&self) -> Option<&Game> {
        let id = self.selected.as_deref()?;
        self.games.iter().find(|g| g.id() == id)
    }

    fn can_launch(&self) -> bool {
        self.ryujinx_validation.is_valid
            && self.games_validation.is_valid
            && self.selected_game().is_some()
            && !self.is_launching
    }
}

type ConsoleObserver = Box<dyn Fn(&ConsoleLine) + Send + Sync>;

struct SessionInner {
    settings: Mutex<Settings>,
    settings_path: Option<PathBuf>,
    store: SharedStore,
    thumbnails: Arc<ThumbnailService>,
    process: EmulatorProcess,
    art: SelectionTracker,
    state: Mutex<SessionState>,
    changed: Condvar,
    console_observer: Mutex<Option<ConsoleObserver>>,
}

#[derive(Clone)]
pub struct LauncherSession {
    inner: Arc<SessionInner>,
}

impl LauncherSession {
    /// Creates a session. Settings are written back to `settings_path`
    /// when the session changes them.
    pub fn new(
        settings: Settings,
        settings_path: Option<PathBuf>,
        store: SharedStore,
        thumbnails: Arc<ThumbnailService>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                settings: Mutex::new(settings),
                settings_path,
                store,
                thumbnails,
                process: EmulatorProcess::new(),
                art: SelectionTracker::new(),
                state: Mutex::new(SessionState::default()),
                changed: Condvar::new(),
                console_observer: Mutex::new(None),
            }),
        }
    }

    /// Session over the user's settings, shared container and cover cache.
    pub fn open_default() -> Result<Self> {
        let settings = Settings::load();
        let store = SharedStore::open_default()
            .ok_or_else(|| Error::Other("no data directory for the shared store".to_string()))?;
        let cache = ImageCache::new(ImageCache::default_dir()).with_shared(store.thumbnails());
        let thumbnails = ThumbnailService::new(Arc::new(cache), Some(store.thumbnails()));
        Ok(Self::new(
            settings,
            Settings::default_path(),
            store,
            Arc::new(thumbnails),
        ))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn settings_guard(&self) -> MutexGuard<'_, Settings> {
        self.inner
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates both directories and starts the initial scan.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        self.validate_emulator();
        self.validate_games_directory();
        self.scan(false)
    }

    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    pub fn thumbnails(&self) -> &ThumbnailService {
        &self.inner.thumbnails
    }

    pub fn settings(&self) -> Settings {
        self.settings_guard().clone()
    }

    pub fn games(&self) -> Vec<Game> {
        self.state().games.clone()
    }

    pub fn selected_game(&self) -> Option<Game> {
        self.state().selected_game().cloned()
    }

    pub fn console(&self) -> Vec<ConsoleLine> {
        self.state().console.clone()
    }

    pub fn clear_console(&self) {
        self.state().console.clear();
    }

    pub fn status_message(&self) -> Option<String> {
        self.state().status_message.clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.state().is_scanning
    }

    pub fn is_launching(&self) -> bool {
        self.state().is_launching
    }

    pub fn ryujinx_validation(&self) -> ValidationResult {
        self.state().ryujinx_validation.clone()
    }

    pub fn games_validation(&self) -> ValidationResult {
        self.state().games_validation.clone()
    }

    /// Whether a deep link asked for the settings to be shown.
    pub fn settings_requested(&self) -> bool {
        self.state().settings_requested
    }

    pub fn art(&self) -> SelectedArt {
        self.state().art.clone()
    }

    pub fn can_launch(&self) -> bool {
        self.state().can_launch()
    }

    /// Where settings changes are saved, if anywhere.
    pub fn settings_path(&self) -> Option<&Path> {
        self.inner.settings_path.as_deref()
    }

    /// Receives every console line as it is appended.
    pub fn set_console_observer(&self, observer: impl Fn(&ConsoleLine) + Send + Sync + 'static) {
        *self
            .inner
            .console_observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(observer));
    }

    fn push_console(&self, line: ConsoleLine) {
        if let Some(observer) = self
            .inner
            .console_observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            observer(&line);
        }
        self.state().console.push(line);
    }

    fn append_system(&self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{}", message);
        self.push_console(ConsoleLine::system(message));
    }

    fn notify(&self) {
        self.inner.changed.notify_all();
    }

    pub fn validate_emulator(&self) -> ValidationResult {
        let directory = self.settings_guard().ryujinx_directory.clone();
        let (result, paths) = validation::validate_emulator(&directory);
        let games_valid = {
            let mut state = self.state();
            state.ryujinx_validation = result.clone();
            state.emulator = paths;
            state.games_validation.is_valid
        };
        self.inner.store.update_validation(result.is_valid, games_valid);
        result
    }

    pub fn validate_games_directory(&self) -> ValidationResult {
        let directory = self.settings_guard().games_directory.clone();
        let result = validation::validate_games_directory(&directory);
        let ryujinx_valid = {
            let mut state = self.state();
            state.games_validation = result.clone();
            state.ryujinx_validation.is_valid
        };
        self.inner.store.update_validation(ryujinx_valid, result.is_valid);
        result
    }

    pub fn set_ryujinx_directory(&self, directory: &str) -> Option<JoinHandle<()>> {
        self.settings_guard().ryujinx_directory = directory.to_string();
        self.save_settings();
        self.validate_emulator();
        self.scan(false)
    }

    pub fn set_games_directory(&self, directory: &str) -> Option<JoinHandle<()>> {
        self.settings_guard().games_directory = directory.to_string();
        self.save_settings();
        self.validate_games_directory();
        self.scan(false)
    }

    fn save_settings(&self) {
        let Some(path) = &self.inner.settings_path else {
            return;
        };
        if let Err(e) = self.settings_guard().save_to(path) {
            log::warn!("Failed to save settings: {}", e);
        }
    }

    /// Rescans the games directory on a worker thread.
    ///
    /// Skipped while a game is launching or the games directory is invalid.
    /// An in-flight scan makes this a no-op unless `force` is set, in which
    /// case the older scan's result is discarded.
    pub fn scan(&self, force: bool) -> Option<JoinHandle<()>> {
        let (generation, games_dir, data_dir) = {
            let mut state = self.state();
            if state.is_launching || !state.games_validation.is_valid {
                return None;
            }
            if state.is_scanning && !force {
                log::debug!("Scan already running");
                return None;
            }
            state.is_scanning = true;
            state.scan_generation += 1;
            state.status_message = Some("Scanning games...".to_string());
            (
                state.scan_generation,
                self.settings_guard().games_path(),
                state.emulator.as_ref().and_then(|e| e.data_dir.clone()),
            )
        };

        let session = self.clone();
        let spawned = thread::Builder::new()
            .name("scan".to_string())
            .spawn(move || {
                let metadata = load_metadata(data_dir.as_deref());
                let result = scan_games(&games_dir, &metadata);
                if session.apply_scan(generation, result) {
                    session.handle_pending_launch();
                }
                session.finish_scan(generation);
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to start scan: {}", e);
                {
                    let mut state = self.state();
                    state.is_scanning = false;
                    state.status_message = Some(format!("Scan failed: {}", e));
                }
                self.notify();
                None
            }
        }
    }

    /// Applies a scan result unless a newer scan has started since.
    fn apply_scan(&self, generation: u64, result: Result<Vec<Game>>) -> bool {
        let mut state = self.state();
        if state.scan_generation != generation {
            log::debug!("Discarding superseded scan {}", generation);
            return false;
        }

        let applied = match result {
            Ok(games) => {
                self.inner.store.update_games_from_library(&games);
                let keep = state
                    .selected
                    .as_deref()
                    .is_some_and(|id| games.iter().any(|g| g.id() == id));
                if !keep {
                    state.selected = games.first().map(|g| g.id().to_string());
                }
                state.status_message = Some(if games.is_empty() {
                    "No games found".to_string()
                } else {
                    format!("Found {} games", games.len())
                });
                log::info!("Scan finished with {} games", games.len());
                state.games = games;
                true
            }
            Err(e) => {
                log::warn!("Scan failed: {}", e);
                state.games.clear();
                state.status_message = Some(format!("Scan failed: {}", e));
                false
            }
        };
        drop(state);
        self.notify();
        applied
    }

    /// Ends scan `generation` once its pending launch has been handled.
    fn finish_scan(&self, generation: u64) {
        {
            let mut state = self.state();
            if state.scan_generation != generation {
                return;
            }
            state.is_scanning = false;
        }
        self.notify();
    }

    /// Blocks until no scan is in flight, including one started elsewhere.
    pub fn wait_for_scan(&self) {
        let mut state = self.state();
        while state.is_scanning {
            state = self
                .inner
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Launches the selected game if everything is configured.
    pub fn launch_selected(&self) -> bool {
        let (game, executable) = {
            let state = self.state();
            if !state.can_launch() {
                return false;
            }
            let (Some(game), Some(emulator)) = (state.selected_game(), state.emulator.as_ref()) else {
                return false;
            };
            (game.clone(), emulator.executable.clone())
        };

        if !game.file_exists() {
            self.append_system(format!("Game file not found: {}", file_name(game.file_path())));
            return false;
        }
        self.start_process(&executable, game.file_path(), game.title(), Some(&game))
    }

    pub fn launch_by_id(&self, id: &str) -> bool {
        let found = {
            let mut state = self.state();
            let found = state.games.iter().any(|g| g.id() == id);
            if found {
                state.selected = Some(id.to_string());
            }
            found
        };
        if !found {
            self.append_system(format!("Game not found for id {}", id));
            return false;
        }
        if self.can_launch() {
            self.launch_selected()
        } else {
            self.append_system("Launch conditions not met. Check paths in Settings.");
            false
        }
    }

    /// Launches an arbitrary file, known to the library or not.
    pub fn launch_by_path(&self, path: &str) -> bool {
        let (executable, launching) = {
            let state = self.state();
            let executable = state
                .emulator
                .as_ref()
                .filter(|_| state.ryujinx_validation.is_valid)
                .map(|e| e.executable.clone());
            (executable, state.is_launching)
        };
        let Some(executable) = executable else {
            self.append_system("Ryujinx not configured. Open Settings.");
            return false;
        };
        if launching {
            self.append_system("Ryujinx is already running");
            return false;
        }

        let path = Path::new(path);
        if !path.is_file() {
            self.append_system(format!("Game file not found at {}", file_name(path)));
            return false;
        }
        self.start_process(&executable, path, &file_name(path), None)
    }

    fn start_process(&self, executable: &Path, game_path: &Path, display: &str, game: Option<&Game>) -> bool {
        let generation = {
            let mut state = self.state();
            state.is_launching = true;
            state.launch_generation += 1;
            state.launch_generation
        };
        self.append_system(format!("Launching {}...", display));

        let output = self.clone();
        let terminated = self.clone();
        let launched = self.inner.process.launch(
            executable,
            game_path,
            move |line| output.push_console(line),
            move |code| terminated.finish_launch(generation, code),
        );

        match launched {
            Ok(()) => {
                if let Some(game) = game {
                    self.inner.store.mark_launched_game(game);
                }
                true
            }
            Err(e) => {
                self.append_system(format!("Failed to launch Ryujinx: {}", e));
                self.state().is_launching = false;
                self.notify();
                false
            }
        }
    }

    /// Exit of the process started as `generation`. Exits of processes
    /// replaced by a later launch leave the session alone.
    fn finish_launch(&self, generation: u64, code: i32) {
        let line = ConsoleLine::system(format!("Ryujinx exited with status {}", code));
        {
            let mut state = self.state();
            if state.launch_generation != generation {
                log::debug!("Ignoring exit status {} of a replaced Ryujinx process", code);
                return;
            }
            state.console.push(line.clone());
            state.is_launching = false;
        }
        log::info!("{}", line.text);
        if let Some(observer) = self
            .inner
            .console_observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            observer(&line);
        }
        self.notify();
    }

    /// Kills the running emulator.
    pub fn stop(&self) {
        self.inner.process.stop();
        self.state().is_launching = false;
        self.append_system("Process terminated by user");
        self.notify();
    }

    /// Blocks until no emulator launched by this session is running.
    pub fn wait_for_exit(&self) {
        let mut state = self.state();
        while state.is_launching {
            state = self
                .inner
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Consumes a launch request left in the shared store by a companion.
    pub fn handle_pending_launch(&self) {
        if self.state().games.is_empty() {
            return;
        }
        let pending = self.inner.store.consume_pending_launch();
        if pending.is_empty() {
            return;
        }
        log::info!("Handling pending launch {:?}", pending);

        let known = {
            let mut state = self.state();
            let found = pending
                .id
                .as_deref()
                .and_then(|id| state.games.iter().find(|g| g.id() == id))
                .or_else(|| {
                    let path = Path::new(pending.path.as_deref()?);
                    state.games.iter().find(|g| g.file_path() == path)
                })
                .map(|g| g.id().to_string());
            if let Some(id) = &found {
                state.selected = Some(id.clone());
            }
            found.is_some()
        };

        if known {
            if self.can_launch() {
                self.launch_selected();
            } else {
                self.append_system("Pending launch blocked. Check Settings.");
            }
        } else if let Some(path) = pending.path {
            self.launch_by_path(&path);
        }
    }

    pub fn handle_deep_link(&self, url: &str) -> DeepLink {
        let link = parse_deep_link(url);
        match &link {
            DeepLink::LaunchId(id) => {
                self.launch_by_id(id);
            }
            DeepLink::LaunchPath(path) => {
                self.launch_by_path(path);
            }
            DeepLink::OpenSettings(show) => self.state().settings_requested = *show,
            DeepLink::Ignored => log::debug!("Ignoring URL {}", url),
        }
        link
    }

    pub fn select_game(&self, id: &str) -> bool {
        let mut state = self.state();
        if state.games.iter().any(|g| g.id() == id) {
            state.selected = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn select_next(&self) {
        self.step_selection(1);
    }

    pub fn select_previous(&self) {
        self.step_selection(-1);
    }

    fn step_selection(&self, step: isize) {
        let mut state = self.state();
        let count = state.games.len();
        if count == 0 {
            return;
        }
        let current = state
            .selected
            .as_deref()
            .and_then(|id| state.games.iter().position(|g| g.id() == id));
        let next = match current {
            Some(index) => (index as isize + step).rem_euclid(count as isize) as usize,
            None => 0,
        };
        state.selected = Some(state.games[next].id().to_string());
    }

    /// Loads cover and background art for the selected game on a worker thread.
    pub fn refresh_art(&self) -> Option<JoinHandle<()>> {
        let game = self.selected_game()?;
        let version = self.settings_guard().background_cache_version();
        let cover_token = self.inner.art.begin(COVER_SLOT);
        let background_token = self.inner.art.begin(BACKGROUND_SLOT);
        self.state().art = SelectedArt {
            game_id: Some(game.id().to_string()),
            ..SelectedArt::default()
        };

        let session = self.clone();
        thread::Builder::new()
            .name("art".to_string())
            .spawn(move || {
                let thumbnails = &session.inner.thumbnails;
                let cover = thumbnails.fetch_thumbnail(&game, Some(COVER_PIXEL_SIZE));
                session
                    .inner
                    .art
                    .commit_if_current(&cover_token, cover, |cover| session.state().art.cover = cover);
                let background = thumbnails.fetch_background(&game, version);
                session.inner.art.commit_if_current(&background_token, background, |background| {
                    session.state().art.background = background
                });
                session.notify();
            })
            .map_err(|e| log::error!("Failed to start art fetch: {}", e))
            .ok()
    }

    fn invalidate_art(&self, slots: &[&str]) {
        for slot in slots {
            self.inner.art.begin(slot);
        }
        let mut state = self.state();
        if slots.contains(&COVER_SLOT) {
            state.art.cover = None;
        }
        state.art.background = None;
    }

    fn bump_background_version(&self) -> u32 {
        let version = self.settings_guard().bump_background_cache_version();
        self.save_settings();
        version
    }

    /// Drops all cached art and moves backgrounds to a new cache version.
    pub fn clear_image_cache(&self) {
        self.inner.thumbnails.cache().clear_all();
        self.inner.store.thumbnails().clear_all();
        self.bump_background_version();
        self.invalidate_art(&[COVER_SLOT, BACKGROUND_SLOT]);
        self.state().status_message = Some("Image cache cleared".to_string());
    }

    /// Forces background art to be fetched again.
    pub fn rebuild_backgrounds(&self) {
        let version = self.bump_background_version();
        log::debug!("Background cache version is now {}", version);
        self.invalidate_art(&[BACKGROUND_SLOT]);
        self.state().status_message = Some("Rebuilding background art…".to_string());
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ConsoleStream;
    use crate::test_helpers::TEST_MUTEX;
    use crate::utils::image_cache::png_bytes;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        session: LauncherSession,
    }

    impl Fixture {
        fn games_dir(&self) -> PathBuf {
            self.dir.path().join("games")
        }

        fn settings_path(&self) -> PathBuf {
            self.dir.path().join("settings.json")
        }
    }

    /// A session whose "Ryujinx" is /bin/sh, so game files are shell scripts.
    fn fixture(games: &[(&str, &str)]) -> Fixture {
        let dir = tempdir().unwrap();
        let games_dir = dir.path().join("games");
        fs::create_dir_all(&games_dir).unwrap();
        for (name, body) in games {
            fs::write(games_dir.join(name), body).unwrap();
        }

        let install = dir.path().join("ryujinx");
        fs::create_dir_all(&install).unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink("/bin/sh", install.join("Ryujinx")).unwrap();

        let settings = Settings {
            ryujinx_directory: install.display().to_string(),
            games_directory: games_dir.display().to_string(),
            ..Settings::default()
        };
        let store = SharedStore::new(dir.path().join("group"));
        let cache = Arc::new(ImageCache::new(dir.path().join("covers")));
        let thumbnails = Arc::new(ThumbnailService::new(cache, Some(store.thumbnails())));
        let session = LauncherSession::new(
            settings,
            Some(dir.path().join("settings.json")),
            store,
            thumbnails,
        );
        Fixture { dir, session }
    }

    fn start(session: &LauncherSession) {
        if let Some(handle) = session.start() {
            handle.join().unwrap();
        }
    }

    fn system_lines(session: &LauncherSession) -> Vec<String> {
        session
            .console()
            .into_iter()
            .filter(|l| l.stream == ConsoleStream::System)
            .map(|l| l.text)
            .collect()
    }

    #[test]
    fn test_parse_deep_link() {
        assert_eq!(
            parse_deep_link("ryjinx://launch?id=%2Fgames%2Fa.nsp"),
            DeepLink::LaunchId("/games/a.nsp".to_string())
        );
        assert_eq!(
            parse_deep_link("ryjinx://launch?path=%2Fgames%2FMy%20Game.nsp"),
            DeepLink::LaunchPath("/games/My Game.nsp".to_string())
        );
        assert_eq!(parse_deep_link("ryjinx://open?settings=1"), DeepLink::OpenSettings(true));
        assert_eq!(parse_deep_link("ryjinx://open"), DeepLink::OpenSettings(false));
        assert_eq!(parse_deep_link("ryjinx://launch"), DeepLink::Ignored);
        assert_eq!(parse_deep_link("https://launch?id=1"), DeepLink::Ignored);
        assert_eq!(parse_deep_link("not a url"), DeepLink::Ignored);
    }

    #[test]
    fn test_validation_messages() {
        let fx = fixture(&[]);
        assert_eq!(fx.session.games_validation().message, "Select games directory");

        let result = fx.session.validate_games_directory();
        assert_eq!(result, ValidationResult::valid("Games directory found"));

        fx.session.set_games_directory(&fx.dir.path().join("missing").display().to_string());
        assert_eq!(fx.session.games_validation().message, "Invalid games directory");

        let snapshot = fx.session.store().load_snapshot().unwrap();
        assert_eq!(snapshot.games_valid, Some(false));
        assert_eq!(Settings::load_from(&fx.settings_path()).games_directory, fx.session.settings().games_directory);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_populates_library_and_snapshot() {
        let fx = fixture(&[
            ("Zelda [0100000000001000].nsp", "exit 0\n"),
            ("alpha.xci", "exit 0\n"),
            ("notes.txt", ""),
        ]);
        start(&fx.session);

        assert!(fx.session.ryujinx_validation().is_valid);
        let games = fx.session.games();
        let titles: Vec<&str> = games.iter().map(|g| g.title()).collect();
        assert_eq!(titles, vec!["alpha", "Zelda"]);
        assert_eq!(fx.session.status_message().as_deref(), Some("Found 2 games"));
        assert_eq!(fx.session.selected_game().unwrap().title(), "alpha");
        assert!(!fx.session.is_scanning());

        let snapshot = fx.session.store().load_snapshot().unwrap();
        assert_eq!(snapshot.games.len(), 2);
        assert_eq!(snapshot.ryujinx_valid, Some(true));
        assert_eq!(snapshot.games_valid, Some(true));
    }

    #[test]
    fn test_scan_keeps_selection_and_reports_empty() {
        let fx = fixture(&[("a.nsp", ""), ("b.nsp", "")]);
        start(&fx.session);
        fx.session.select_next();
        assert_eq!(fx.session.selected_game().unwrap().title(), "b");

        fx.session.scan(true).unwrap().join().unwrap();
        assert_eq!(fx.session.selected_game().unwrap().title(), "b");

        fs::remove_file(fx.games_dir().join("a.nsp")).unwrap();
        fs::remove_file(fx.games_dir().join("b.nsp")).unwrap();
        fx.session.scan(true).unwrap().join().unwrap();
        assert_eq!(fx.session.status_message().as_deref(), Some("No games found"));
        assert!(fx.session.selected_game().is_none());
    }

    #[test]
    fn test_superseded_scan_is_discarded() {
        let fx = fixture(&[("a.nsp", "")]);
        start(&fx.session);
        let stale = fx.session.state().scan_generation;
        fx.session.state().scan_generation += 1;

        assert!(!fx.session.apply_scan(stale, Ok(Vec::new())));
        assert_eq!(fx.session.games().len(), 1);

        let current = fx.session.state().scan_generation;
        let err = Err(Error::GamesDirectoryNotFound(PathBuf::from("/gone")));
        assert!(!fx.session.apply_scan(current, err));
        assert!(fx.session.games().is_empty());
        assert!(fx
            .session
            .status_message()
            .unwrap()
            .starts_with("Scan failed: "));
    }

    #[test]
    fn test_scan_skipped_without_games_directory() {
        let fx = fixture(&[]);
        assert!(fx.session.scan(false).is_none());
        fx.session.validate_games_directory();
        fx.session.state().is_scanning = true;
        assert!(fx.session.scan(false).is_none());
        assert!(fx.session.scan(true).is_some_and(|h| h.join().is_ok()));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_selected_runs_game() {
        let fx = fixture(&[("Hello.nsp", "echo hello from game\nexit 7\n")]);
        start(&fx.session);
        let game = fx.session.selected_game().unwrap();

        assert!(fx.session.launch_selected());
        fx.session.wait_for_exit();

        assert_eq!(
            system_lines(&fx.session),
            vec!["Launching Hello...", "Ryujinx exited with status 7"]
        );
        assert!(fx
            .session
            .console()
            .iter()
            .any(|l| l.stream == ConsoleStream::Stdout && l.text == "hello from game"));

        let snapshot = fx.session.store().load_snapshot().unwrap();
        assert_eq!(snapshot.last_launched_id.as_deref(), Some(game.id()));
        assert!(snapshot.games[0].last_played.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_failures_are_reported() {
        let fx = fixture(&[("Hello.nsp", "exit 0\n")]);
        start(&fx.session);

        assert!(!fx.session.launch_by_id("nope"));
        fs::remove_file(fx.games_dir().join("Hello.nsp")).unwrap();
        assert!(!fx.session.launch_selected());
        assert!(!fx.session.launch_by_path("/definitely/missing.nsp"));

        assert_eq!(
            system_lines(&fx.session),
            vec![
                "Game not found for id nope",
                "Game file not found: Hello.nsp",
                "Game file not found at missing.nsp",
            ]
        );
        assert!(!fx.session.is_launching());
    }

    #[test]
    fn test_launch_by_path_requires_emulator() {
        let fx = fixture(&[("Hello.nsp", "")]);
        fx.session.launch_by_path("/games/Hello.nsp");
        assert_eq!(
            system_lines(&fx.session),
            vec!["Ryujinx not configured. Open Settings."]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_pending_launch_after_scan() {
        let fx = fixture(&[("a.nsp", "exit 0\n"), ("b.nsp", "exit 0\n")]);
        let target = fx.games_dir().join("b.nsp");
        fx.session
            .store()
            .set_pending_launch_path(target.display().to_string());

        start(&fx.session);
        fx.session.wait_for_exit();

        assert_eq!(fx.session.selected_game().unwrap().title(), "b");
        assert_eq!(
            system_lines(&fx.session),
            vec!["Launching b...", "Ryujinx exited with status 0"]
        );
        let pending = fx.session.store().consume_pending_launch();
        assert!(pending.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_terminates_game() {
        let fx = fixture(&[("Long.nsp", "exec sleep 30\n")]);
        start(&fx.session);

        assert!(fx.session.launch_selected());
        assert!(!fx.session.can_launch());
        fx.session.stop();
        fx.session.wait_for_exit();

        let lines = system_lines(&fx.session);
        assert_eq!(lines[0], "Launching Long...");
        assert!(lines.contains(&"Process terminated by user".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_after_stop_runs_new_game() {
        let fx = fixture(&[
            ("Hello.nsp", "echo hello from game\nexit 5\n"),
            ("Long.nsp", "exec sleep 30\n"),
        ]);
        start(&fx.session);
        let id_of = |title: &str| {
            fx.session
                .games()
                .into_iter()
                .find(|g| g.title() == title)
                .unwrap()
                .id()
                .to_string()
        };

        assert!(fx.session.select_game(&id_of("Long")));
        assert!(fx.session.launch_selected());
        fx.session.stop();

        assert!(fx.session.select_game(&id_of("Hello")));
        assert!(fx.session.launch_selected());
        fx.session.wait_for_exit();

        assert!(fx
            .session
            .console()
            .iter()
            .any(|l| l.stream == ConsoleStream::Stdout && l.text == "hello from game"));
        let lines = system_lines(&fx.session);
        let relaunch = lines.iter().position(|l| l == "Launching Hello...").unwrap();
        assert_eq!(lines[relaunch + 1..], ["Ryujinx exited with status 5".to_string()]);
        assert!(!fx.session.is_launching());
    }

    #[test]
    fn test_deep_link_open_settings() {
        let fx = fixture(&[]);
        assert!(!fx.session.settings_requested());
        fx.session.handle_deep_link("ryjinx://open?settings=1");
        assert!(fx.session.settings_requested());
    }

    #[test]
    fn test_selection_wraps() {
        let fx = fixture(&[("a.nsp", ""), ("b.nsp", ""), ("c.nsp", "")]);
        start(&fx.session);
        let title = |s: &LauncherSession| s.selected_game().unwrap().title().to_string();

        assert_eq!(title(&fx.session), "a");
        fx.session.select_previous();
        assert_eq!(title(&fx.session), "c");
        fx.session.select_next();
        assert_eq!(title(&fx.session), "a");
        assert!(fx.session.select_game(fx.session.games()[1].id()));
        assert_eq!(title(&fx.session), "b");
        assert!(!fx.session.select_game("missing"));
    }

    #[test]
    fn test_clear_image_cache_bumps_background_version() {
        let fx = fixture(&[]);
        fx.session.thumbnails().cache().store(&png_bytes(2, 2), "k", "png");

        fx.session.clear_image_cache();
        assert!(fx.session.thumbnails().cache().image_data("k").is_none());
        assert_eq!(fx.session.settings().background_cache_version(), 2);
        assert_eq!(
            Settings::load_from(&fx.settings_path()).background_cache_version(),
            2
        );
        assert_eq!(fx.session.status_message().as_deref(), Some("Image cache cleared"));

        fx.session.rebuild_backgrounds();
        assert_eq!(fx.session.settings().background_cache_version(), 3);
    }

    #[test]
    fn test_refresh_art_uses_cached_cover() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let fx = fixture(&[("Cover Game.nsp", "")]);
        start(&fx.session);
        let game = fx.session.selected_game().unwrap();
        fx.session
            .thumbnails()
            .cache()
            .store(&png_bytes(1024, 1024), &game.thumbnail_key(), "png");

        fx.session.refresh_art().unwrap().join().unwrap();
        let art = fx.session.art();
        assert_eq!(art.game_id.as_deref(), Some(game.id()));
        assert_eq!(art.cover.unwrap().width(), COVER_PIXEL_SIZE);
        assert!(art.background.is_none());
    }
}
