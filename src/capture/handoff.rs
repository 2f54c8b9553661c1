// SPDX-License-Identifier: GPL-3.0-only

//! Handoff of captured photos to the review screen
//!
//! The capture screen writes the pair once; the review screen reads it and
//! falls back to placeholder images when nothing was stored. The pair stays
//! until a successful publish clears it, so reopening the review screen shows
//! the same photos.

use super::CapturedPhotoPair;
use crate::constants::handoff::{
    BACK_FALLBACK_FILE, FRONT_FALLBACK_FILE, SESSION_FILE_NAME, STORAGE_KEY_BACK,
    STORAGE_KEY_FRONT,
};
use crate::errors::{AppError, AppResult};
use crate::media::is_image_data_uri;
use crate::storage::bucket_asset_url;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Images shown when no capture is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackImages {
    pub front: String,
    pub back: String,
}

impl FallbackImages {
    /// Placeholder photos from the feeds bucket
    pub fn from_bucket(base_url: &str, feeds_bucket: &str) -> Self {
        Self {
            front: bucket_asset_url(base_url, feeds_bucket, FRONT_FALLBACK_FILE),
            back: bucket_asset_url(base_url, feeds_bucket, BACK_FALLBACK_FILE),
        }
    }
}

impl Default for FallbackImages {
    fn default() -> Self {
        Self::from_bucket("", "feeds")
    }
}

/// Photos the review screen displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPhotos {
    pub front: String,
    pub back: String,
}

impl ReviewPhotos {
    /// True if both photos are fresh captures rather than placeholders
    pub fn is_capture(&self) -> bool {
        is_image_data_uri(&self.front) && is_image_data_uri(&self.back)
    }
}

/// Raw stored values, either may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredPhotos {
    pub front: Option<String>,
    pub back: Option<String>,
}

/// One-shot storage between the capture and review screens
pub trait CaptureStore: Send + Sync {
    /// Store both photos, replacing any previous pair
    fn put(&self, pair: &CapturedPhotoPair) -> AppResult<()>;

    /// Read what is stored
    fn load(&self) -> AppResult<StoredPhotos>;

    /// Forget the stored pair
    fn clear(&self) -> AppResult<()>;

    /// Placeholder images for missing entries
    fn fallback(&self) -> &FallbackImages;

    /// Photos for the review screen, with placeholders for missing entries
    fn take(&self) -> ReviewPhotos {
        let stored = self.load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read stored capture");
            StoredPhotos::default()
        });
        let fallback = self.fallback();
        let pick = |value: Option<String>, fallback: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        ReviewPhotos {
            front: pick(stored.front, &fallback.front),
            back: pick(stored.back, &fallback.back),
        }
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryCaptureStore {
    items: Mutex<HashMap<&'static str, String>>,
    fallback: FallbackImages,
    puts: AtomicUsize,
}

impl MemoryCaptureStore {
    pub fn new(fallback: FallbackImages) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            fallback,
            puts: AtomicUsize::new(0),
        }
    }

    /// Number of `put` calls so far
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl CaptureStore for MemoryCaptureStore {
    fn put(&self, pair: &CapturedPhotoPair) -> AppResult<()> {
        let mut items = self.items.lock();
        items.insert(STORAGE_KEY_FRONT, pair.front.clone());
        items.insert(STORAGE_KEY_BACK, pair.back.clone());
        self.puts.fetch_add(1, Ordering::SeqCst);
        debug!("Capture stored in memory");
        Ok(())
    }

    fn load(&self) -> AppResult<StoredPhotos> {
        let items = self.items.lock();
        Ok(StoredPhotos {
            front: items.get(STORAGE_KEY_FRONT).cloned(),
            back: items.get(STORAGE_KEY_BACK).cloned(),
        })
    }

    fn clear(&self) -> AppResult<()> {
        let mut items = self.items.lock();
        items.remove(STORAGE_KEY_FRONT);
        items.remove(STORAGE_KEY_BACK);
        Ok(())
    }

    fn fallback(&self) -> &FallbackImages {
        &self.fallback
    }
}

/// Store backed by a JSON file, for handing a capture from one process to another
///
/// The file holds one object keyed like the browser session entries.
#[derive(Debug)]
pub struct SessionFileStore {
    path: PathBuf,
    fallback: FallbackImages,
}

impl SessionFileStore {
    /// Store in `dir/capture-session.json`
    pub fn in_dir(dir: &Path, fallback: FallbackImages) -> Self {
        Self {
            path: dir.join(SESSION_FILE_NAME),
            fallback,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> AppResult<Map<String, Value>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(AppError::Storage(format!(
                    "{} does not hold a JSON object",
                    self.path.display()
                ))),
                Err(e) => Err(AppError::Storage(format!("{}: {}", self.path.display(), e))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CaptureStore for SessionFileStore {
    fn put(&self, pair: &CapturedPhotoPair) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut map = Map::new();
        map.insert(STORAGE_KEY_FRONT.to_string(), Value::String(pair.front.clone()));
        map.insert(STORAGE_KEY_BACK.to_string(), Value::String(pair.back.clone()));
        map.insert(
            "captured_at".to_string(),
            Value::String(pair.captured_at.to_rfc3339()),
        );
        let contents = serde_json::to_vec(&Value::Object(map))
            .map_err(|e| AppError::Storage(e.to_string()))?;

        // Write then rename so a reader never sees half a file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), "Capture stored");
        Ok(())
    }

    fn load(&self) -> AppResult<StoredPhotos> {
        let map = self.read_map()?;
        let get = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        Ok(StoredPhotos {
            front: get(STORAGE_KEY_FRONT),
            back: get(STORAGE_KEY_BACK),
        })
    }

    fn clear(&self) -> AppResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Capture session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn fallback(&self) -> &FallbackImages {
        &self.fallback
    }
}
