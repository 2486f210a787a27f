//! Cover art lookups.
//!
//! Art is looked up by title id on nlib first, then by title on the
//! Nintendo Europe search API. Both are best effort: any failure simply
//! means no art. Results are written to the [`ImageCache`] and mirrored
//! into the shared thumbnail store for companion processes.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};

use image::{DynamicImage, ImageReader};
use serde::Deserialize;

use crate::core::models::Game;
use crate::core::shared_store::SharedThumbnailStore;
use crate::utils::image_cache::ImageCache;

const NLIB_URL: &str = "https://api.nlib.cc/nx";
const NINTENDO_SEARCH_URL: &str = "https://search.nintendo-europe.com/en/select";
const NINTENDO_SEARCH_FILTER: &str = "type:GAME AND system_type:nintendoswitch*";

const BACKGROUND_MIN_WIDTH: u32 = 1200;
const BACKGROUND_MIN_HEIGHT: u32 = 600;
const BACKGROUND_MIN_ASPECT: f64 = 1.4;
const BACKGROUND_MAX_ASPECT: f64 = 2.2;

#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

#[cfg(not(test))]
fn http_get(url: &str) -> Option<HttpResponse> {
    use std::io::Read;

    const MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

    let response = match ureq::get(url)
        .timeout(std::time::Duration::from_secs(20))
        .call()
    {
        Ok(response) => response,
        Err(e) => {
            log::debug!("Request to {} failed: {}", url, e);
            return None;
        }
    };
    if !(200..300).contains(&response.status()) {
        return None;
    }

    let content_type = response.header("Content-Type").map(str::to_string);
    let mut body = Vec::new();
    if let Err(e) = response
        .into_reader()
        .take(MAX_BODY_BYTES)
        .read_to_end(&mut body)
    {
        log::debug!("Failed to read response from {}: {}", url, e);
        return None;
    }
    Some(HttpResponse { body, content_type })
}

#[cfg(test)]
pub static HTTP_RESPONSES: once_cell::sync::Lazy<Mutex<HashMap<String, HttpResponse>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(HashMap::new()));

#[cfg(test)]
pub static HTTP_REQUESTS: once_cell::sync::Lazy<Mutex<Vec<String>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(Vec::new()));

#[cfg(test)]
fn http_get(url: &str) -> Option<HttpResponse> {
    HTTP_REQUESTS.lock().unwrap().push(url.to_string());
    HTTP_RESPONSES.lock().unwrap().get(url).cloned()
}

#[derive(Deserialize)]
struct NlibGame {
    icon: Option<String>,
    banner: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    response: SearchDocs,
}

#[derive(Deserialize)]
struct SearchDocs {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Deserialize)]
struct SearchDoc {
    image_url: Option<String>,
    image_url_sq_s: Option<String>,
    image_url_h2x1_s: Option<String>,
    image_url_h2x1: Option<String>,
}

pub fn nlib_url(title_id: &str) -> String {
    format!("{}/{}?fields=name,icon,banner", NLIB_URL, title_id)
}

pub fn nintendo_search_url(title: &str) -> Option<String> {
    url::Url::parse_with_params(
        NINTENDO_SEARCH_URL,
        &[
            ("q", title),
            ("fq", NINTENDO_SEARCH_FILTER),
            ("rows", "1"),
            ("start", "0"),
            ("wt", "json"),
        ],
    )
    .ok()
    .map(String::from)
}

fn enforce_https(url: &str) -> String {
    match url.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("http://") => format!("https://{}", &url[7..]),
        _ => url.to_string(),
    }
}

/// Picks the cache file extension from the Content-Type, then the URL.
fn file_extension(content_type: Option<&str>, url: &str) -> String {
    if let Some(mime) = content_type.map(str::to_lowercase) {
        if mime.contains("png") {
            return "png".to_string();
        }
        if mime.contains("jpeg") || mime.contains("jpg") {
            return "jpg".to_string();
        }
        if mime.contains("webp") {
            return "webp".to_string();
        }
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" | "webp" => ext,
        // Anything else is stored as jpg, the cache only reads back known extensions.
        _ => "jpg".to_string(),
    }
}

/// Whether `data` is a wide, large enough image to serve as a background.
pub fn is_valid_background(data: &[u8]) -> bool {
    let dimensions = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());
    let Some((width, height)) = dimensions else {
        return false;
    };
    if width < BACKGROUND_MIN_WIDTH || height < BACKGROUND_MIN_HEIGHT {
        return false;
    }
    let aspect = f64::from(width) / f64::from(height.max(1));
    (BACKGROUND_MIN_ASPECT..=BACKGROUND_MAX_ASPECT).contains(&aspect)
}

pub fn background_cache_key(game: &Game, version: u32) -> String {
    format!("{}:bg-v{}", game.thumbnail_key(), version.max(1))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ArtKind {
    Cover,
    Background,
}

pub struct ThumbnailService {
    cache: Arc<ImageCache>,
    shared: Option<SharedThumbnailStore>,
}

impl ThumbnailService {
    pub fn new(cache: Arc<ImageCache>, shared: Option<SharedThumbnailStore>) -> Self {
        Self { cache, shared }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Cover art for `game`, from the cache or the remote providers.
    pub fn fetch_thumbnail(&self, game: &Game, target_pixel_size: Option<u32>) -> Option<Arc<DynamicImage>> {
        let key = game.thumbnail_key();
        if let Some(size) = target_pixel_size {
            if let Some(scaled) = self.cache.scaled_image(&key, size) {
                return Some(scaled);
            }
        }
        if let Some(cached) = self.cache.image(&key) {
            return Some(cached);
        }

        let fetched = game
            .title_id()
            .and_then(|id| self.fetch_from_nlib(id, &key, ArtKind::Cover))
            .or_else(|| self.fetch_from_search(game.title(), &key, ArtKind::Cover));

        match (fetched, target_pixel_size) {
            (Some(_), Some(size)) => self.cache.scaled_image(&key, size),
            (fetched, _) => fetched,
        }
    }

    /// Wide background art for `game`. `version` is bumped by the user to
    /// force previously cached backgrounds to be fetched again.
    pub fn fetch_background(&self, game: &Game, version: u32) -> Option<Arc<DynamicImage>> {
        let key = background_cache_key(game, version);
        if let Some(data) = self.cache.image_data(&key) {
            if is_valid_background(&data) {
                if let Some(image) = self.cache.image(&key) {
                    return Some(image);
                }
            }
            log::debug!("Dropping unusable cached background for {}", key);
            self.cache.remove(&key);
        }

        game.title_id()
            .and_then(|id| self.fetch_from_nlib(id, &key, ArtKind::Background))
            .or_else(|| self.fetch_from_search(game.title(), &key, ArtKind::Background))
    }

    fn fetch_from_nlib(&self, title_id: &str, key: &str, kind: ArtKind) -> Option<Arc<DynamicImage>> {
        let response = http_get(&nlib_url(title_id))?;
        let info: NlibGame = serde_json::from_slice(&response.body).ok()?;

        let url = match kind {
            ArtKind::Background => info.banner,
            ArtKind::Cover => info.icon.or(info.banner),
        }?;
        self.fetch_image(&enforce_https(&url), key, kind)
    }

    fn fetch_from_search(&self, title: &str, key: &str, kind: ArtKind) -> Option<Arc<DynamicImage>> {
        let response = http_get(&nintendo_search_url(title)?)?;
        let result: SearchResponse = serde_json::from_slice(&response.body).ok()?;
        let doc = result.response.docs.into_iter().next()?;

        let url = match kind {
            ArtKind::Background => doc.image_url_h2x1.or(doc.image_url_h2x1_s),
            ArtKind::Cover => doc.image_url.or(doc.image_url_sq_s).or(doc.image_url_h2x1_s),
        }?;
        self.fetch_image(&enforce_https(&url), key, kind)
    }

    fn fetch_image(&self, url: &str, key: &str, kind: ArtKind) -> Option<Arc<DynamicImage>> {
        let response = http_get(url)?;
        if kind == ArtKind::Background && !is_valid_background(&response.body) {
            log::debug!("Rejected background from {}", url);
            return None;
        }

        let ext = file_extension(response.content_type.as_deref(), url);
        let image = self.cache.store(&response.body, key, &ext);
        if let Some(shared) = &self.shared {
            shared.store(&response.body, key, &ext);
        }
        image
    }
}

/// Ticket for an in-flight fetch in a given slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchToken {
    slot: String,
    generation: u64,
}

/// Tracks the newest request per slot so late results of superseded
/// requests can be discarded.
#[derive(Default)]
pub struct SelectionTracker {
    generations: Mutex<HashMap<String, u64>>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request in `slot`, invalidating earlier tokens for it.
    pub fn begin(&self, slot: &str) -> FetchToken {
        let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = generations.entry(slot.to_string()).or_insert(0);
        *generation += 1;
        FetchToken {
            slot: slot.to_string(),
            generation: *generation,
        }
    }

    pub fn is_current(&self, token: &FetchToken) -> bool {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&token.slot)
            .map(|g| *g == token.generation)
            .unwrap_or(false)
    }

    /// Runs `apply` with `value` only if `token` is still the newest for its slot.
    pub fn commit_if_current<T>(&self, token: &FetchToken, value: T, apply: impl FnOnce(T)) -> bool {
        if self.is_current(token) {
            apply(value);
            true
        } else {
            log::debug!("Discarding stale result for slot {}", token.slot);
            false
        }
    }
}
