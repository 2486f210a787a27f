use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image::DynamicImage;

use crate::core::shared_store::{hash_key, SharedThumbnailStore, THUMBNAIL_EXTENSIONS};

const MEMORY_CACHE_LIMIT: usize = 64;

#[derive(Default)]
struct MemoryTier {
    images: HashMap<String, Arc<DynamicImage>>,
    order: VecDeque<String>,
}

impl MemoryTier {
    fn get(&self, key: &str) -> Option<Arc<DynamicImage>> {
        self.images.get(key).cloned()
    }

    fn insert(&mut self, key: &str, image: Arc<DynamicImage>) {
        self.images.insert(key.to_string(), image);
        self.order.retain(|k| k != key);
        self.order.push_back(key.to_string());
        if self.order.len() > MEMORY_CACHE_LIMIT {
            if let Some(old) = self.order.pop_front() {
                self.images.remove(&old);
            }
        }
    }

    fn remove_prefixed(&mut self, key: &str) {
        let scaled_prefix = format!("{}#", key);
        self.images
            .retain(|k, _| k != key && !k.starts_with(&scaled_prefix));
        self.order
            .retain(|k| k != key && !k.starts_with(&scaled_prefix));
    }

    fn clear(&mut self) {
        self.images.clear();
        self.order.clear();
    }
}

/// Cover art cache: decoded images in memory in front of raw bytes on disk.
///
/// The disk tier is the source of truth. The memory tier only holds a
/// bounded number of recently used images and may drop any of them.
pub struct ImageCache {
    dir: PathBuf,
    memory: Mutex<MemoryTier>,
    shared: Option<SharedThumbnailStore>,
}

impl ImageCache {
    pub fn new(dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&dir) {
            log::warn!("Failed to create image cache {}: {}", dir.display(), e);
        }
        Self {
            dir,
            memory: Mutex::new(MemoryTier::default()),
            shared: None,
        }
    }

    /// Also mirrors images found on disk into the shared thumbnail store.
    pub fn with_shared(mut self, shared: SharedThumbnailStore) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn default_dir() -> PathBuf {
        dirs_next::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("RyjinxLauncher")
            .join("Covers")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn memory(&self) -> std::sync::MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn file_path(&self, key: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", hash_key(key), extension))
    }

    /// Returns the decoded image for `key`, loading it from disk on a memory miss.
    pub fn image(&self, key: &str) -> Option<Arc<DynamicImage>> {
        if let Some(image) = self.memory().get(key) {
            return Some(image);
        }

        for ext in THUMBNAIL_EXTENSIONS {
            let Ok(data) = fs::read(self.file_path(key, ext)) else {
                continue;
            };
            match image::load_from_memory(&data) {
                Ok(decoded) => {
                    let decoded = Arc::new(decoded);
                    self.memory().insert(key, Arc::clone(&decoded));
                    if let Some(shared) = &self.shared {
                        shared.store(&data, key, ext);
                    }
                    return Some(decoded);
                }
                Err(e) => log::debug!("Cached image for '{}' is not decodable: {}", key, e),
            }
        }
        None
    }

    /// Returns the image for `key` downscaled to fit `max_pixel_size`. Never upscales.
    pub fn scaled_image(&self, key: &str, max_pixel_size: u32) -> Option<Arc<DynamicImage>> {
        let scaled_key = format!("{}#{}", key, max_pixel_size);
        if let Some(image) = self.memory().get(&scaled_key) {
            return Some(image);
        }

        let data = self.image_data(key)?;
        let full = image::load_from_memory(&data).ok()?;
        let scaled = if full.width().max(full.height()) > max_pixel_size {
            full.thumbnail(max_pixel_size, max_pixel_size)
        } else {
            full
        };
        let scaled = Arc::new(scaled);
        self.memory().insert(&scaled_key, Arc::clone(&scaled));
        Some(scaled)
    }

    /// Raw bytes stored for `key`, trying each known extension.
    pub fn image_data(&self, key: &str) -> Option<Vec<u8>> {
        THUMBNAIL_EXTENSIONS
            .iter()
            .find_map(|ext| fs::read(self.file_path(key, ext)).ok())
    }

    /// Path of the file stored for `key`, if any.
    pub fn cached_path(&self, key: &str) -> Option<PathBuf> {
        THUMBNAIL_EXTENSIONS
            .iter()
            .map(|ext| self.file_path(key, ext))
            .find(|p| p.is_file())
    }

    /// Writes `data` to disk and, when it decodes, to memory.
    pub fn store(&self, data: &[u8], key: &str, extension: &str) -> Option<Arc<DynamicImage>> {
        let path = self.file_path(key, extension);
        if let Err(e) = fs::create_dir_all(&self.dir).and_then(|_| fs::write(&path, data)) {
            log::warn!("Failed to write {}: {}", path.display(), e);
            return None;
        }

        let mut memory = self.memory();
        memory.remove_prefixed(key);
        match image::load_from_memory(data) {
            Ok(decoded) => {
                let decoded = Arc::new(decoded);
                memory.insert(key, Arc::clone(&decoded));
                Some(decoded)
            }
            Err(e) => {
                log::debug!("Stored image for '{}' is not decodable: {}", key, e);
                None
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.memory().remove_prefixed(key);
        for ext in THUMBNAIL_EXTENSIONS {
            let _ = fs::remove_file(self.file_path(key, ext));
        }
    }

    pub fn clear_all(&self) {
        self.memory().clear();
        if self.dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                log::warn!("Failed to clear {}: {}", self.dir.display(), e);
                return;
            }
        }
        if let Err(e) = fs::create_dir_all(&self.dir) {
            log::warn!("Failed to recreate {}: {}", self.dir.display(), e);
        }
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_and_lookup() {
        let dir = tempdir().unwrap();
        let cache = ImageCache::new(dir.path().join("covers"));
        let data = png_bytes(4, 2);

        assert!(cache.image("k").is_none());
        let stored = cache.store(&data, "k", "png").unwrap();
        assert_eq!((stored.width(), stored.height()), (4, 2));
        assert_eq!(cache.image_data("k").unwrap(), data);
        assert!(cache.cached_path("k").unwrap().ends_with(format!("{}.png", hash_key("k"))));
    }

    #[test]
    fn test_disk_tier_survives_new_instance() {
        let dir = tempdir().unwrap();
        let shared_dir = dir.path().join("shared");
        {
            let cache = ImageCache::new(dir.path().join("covers"));
            cache.store(&png_bytes(3, 3), "k", "png");
        }

        let cache = ImageCache::new(dir.path().join("covers"))
            .with_shared(SharedThumbnailStore::new(shared_dir.clone()));
        let image = cache.image("k").unwrap();
        assert_eq!(image.width(), 3);
        // loading from disk mirrors the bytes for companions
        assert!(SharedThumbnailStore::new(shared_dir).image_data("k").is_some());
    }

    #[test]
    fn test_undecodable_data_is_kept_on_disk() {
        let dir = tempdir().unwrap();
        let cache = ImageCache::new(dir.path().to_path_buf());
        assert!(cache.store(b"not an image", "k", "jpg").is_none());
        assert_eq!(cache.image_data("k").unwrap(), b"not an image");
        assert!(cache.image("k").is_none());
    }

    #[test]
    fn test_scaled_image() {
        let dir = tempdir().unwrap();
        let cache = ImageCache::new(dir.path().to_path_buf());
        cache.store(&png_bytes(400, 200), "k", "png");

        let scaled = cache.scaled_image("k", 100).unwrap();
        assert_eq!((scaled.width(), scaled.height()), (100, 50));

        let unscaled = cache.scaled_image("k", 1000).unwrap();
        assert_eq!((unscaled.width(), unscaled.height()), (400, 200));

        assert!(cache.scaled_image("missing", 100).is_none());
    }

    #[test]
    fn test_store_replaces_scaled_variants() {
        let dir = tempdir().unwrap();
        let cache = ImageCache::new(dir.path().to_path_buf());
        cache.store(&png_bytes(400, 200), "k", "png");
        assert_eq!(cache.scaled_image("k", 100).unwrap().height(), 50);

        cache.store(&png_bytes(200, 200), "k", "png");
        assert_eq!(cache.scaled_image("k", 100).unwrap().height(), 100);
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = tempdir().unwrap();
        let cache = ImageCache::new(dir.path().join("covers"));
        cache.store(&png_bytes(1, 1), "a", "png");
        cache.store(&png_bytes(1, 1), "b", "jpg");

        cache.remove("a");
        assert!(cache.image("a").is_none());
        assert!(cache.image_data("b").is_some());

        cache.clear_all();
        assert!(cache.image("b").is_none());
        assert!(cache.dir().exists());
    }

    #[test]
    fn test_memory_tier_is_bounded() {
        let mut tier = MemoryTier::default();
        let img = Arc::new(DynamicImage::ImageRgb8(image::RgbImage::new(1, 1)));
        for i in 0..(MEMORY_CACHE_LIMIT + 5) {
            tier.insert(&i.to_string(), Arc::clone(&img));
        }
        assert_eq!(tier.images.len(), MEMORY_CACHE_LIMIT);
        assert!(tier.get("0").is_none());
        assert!(tier.get(&(MEMORY_CACHE_LIMIT + 4).to_string()).is_some());
    }
}
