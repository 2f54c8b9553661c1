// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{JpegQualityPreset, mask, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the platform config/data/cache dirs
const APP_DIR: &str = "ping";

/// Config file name inside the config dir
const CONFIG_FILE: &str = "config.json";

/// User configuration
///
/// Every field has a default, so a partial or missing file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pause between stopping one camera and opening the next (ms)
    pub stream_settle_delay_ms: u64,
    /// Pause before capturing the back camera (ms)
    pub capture_settle_delay_ms: u64,
    /// Maximum wait for a camera to become ready (ms)
    pub ready_timeout_ms: u64,
    /// Readiness polling interval (ms)
    pub ready_poll_interval_ms: u64,
    /// Minimum interval between face detections (ms)
    pub detect_interval_ms: u64,
    /// Overlay render interval (ms)
    pub frame_interval_ms: u64,
    /// JPEG quality of captured photos
    pub jpeg_quality: JpegQualityPreset,
    /// Directory holding mask artwork (`Popcat.svg`, ... or `popcat.png`)
    pub mask_dir: Option<PathBuf>,
    /// Mask selected when the capture screen opens
    pub default_mask: String,
    /// ONNX face detector model (used with the `onnx` feature)
    pub face_model: Option<PathBuf>,
    /// ONNX 68-point landmark model; without it masks are not tilted
    pub landmark_model: Option<PathBuf>,
    /// Directory for the capture session file
    pub session_dir: Option<PathBuf>,
    /// Base URL of the Ping! API
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream_settle_delay_ms: timing::STREAM_SETTLE_DELAY.as_millis() as u64,
            capture_settle_delay_ms: timing::CAPTURE_SETTLE_DELAY.as_millis() as u64,
            ready_timeout_ms: timing::READY_TIMEOUT.as_millis() as u64,
            ready_poll_interval_ms: timing::READY_POLL_INTERVAL.as_millis() as u64,
            detect_interval_ms: timing::DETECT_INTERVAL.as_millis() as u64,
            frame_interval_ms: timing::FRAME_INTERVAL.as_millis() as u64,
            jpeg_quality: JpegQualityPreset::default(),
            mask_dir: None,
            default_mask: mask::DEFAULT_MASK.to_string(),
            face_model: None,
            landmark_model: None,
            session_dir: None,
            api_base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    /// Default location: `<config_dir>/ping/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Write to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn capture_settle_delay(&self) -> Duration {
        Duration::from_millis(self.capture_settle_delay_ms)
    }

    pub fn detect_interval(&self) -> Duration {
        Duration::from_millis(self.detect_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Mask directory, defaulting to `<data_dir>/ping/masks`
    pub fn mask_dir(&self) -> PathBuf {
        self.mask_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR)
                .join("masks")
        })
    }

    /// Session file directory, defaulting to the runtime dir or `<cache_dir>/ping`
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone().unwrap_or_else(|| {
            dirs::runtime_dir()
                .or_else(dirs::cache_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR)
        })
    }
}

/// Settings of the REST proxy service, read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEnv {
    /// Hosted backend base URL
    pub supabase_url: String,
    /// Service credential sent as `apikey` and bearer token
    pub service_role_key: String,
    pub feeds_bucket: String,
    pub profiles_bucket: String,
    /// Identity provider application id
    pub app_id: Option<String>,
    /// Key for signing nonce cookies
    pub nonce_secret: Option<String>,
}

impl BackendEnv {
    /// Read from the process environment
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup
    ///
    /// Each setting prefers the server-side name and falls back to the
    /// `NEXT_PUBLIC_` one. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let supabase_url = get(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"])
            .ok_or_else(|| AppError::Config("Supabase URL is not configured".to_string()))?;
        let service_role_key = get(&["SUPABASE_SERVICE_ROLE_KEY"]).ok_or_else(|| {
            AppError::Config("Supabase service role key is not configured".to_string())
        })?;

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            service_role_key,
            feeds_bucket: get(&["SUPABASE_FEEDS_BUCKET", "NEXT_PUBLIC_SUPABASE_FEEDS_BUCKET"])
                .unwrap_or_else(|| "feeds".to_string()),
            profiles_bucket: get(&[
                "SUPABASE_PROFILES_BUCKET",
                "NEXT_PUBLIC_SUPABASE_PROFILES_BUCKET",
            ])
            .unwrap_or_else(|| "profiles".to_string()),
            app_id: get(&["APP_ID", "NEXT_PUBLIC_APP_ID"]),
            nonce_secret: get(&["PING_NONCE_SECRET"]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_public_name_fallback() {
        let env = BackendEnv::from_lookup(lookup(&[
            ("NEXT_PUBLIC_SUPABASE_URL", "https://db.example.co/"),
            ("SUPABASE_SERVICE_ROLE_KEY", "secret"),
            ("NEXT_PUBLIC_SUPABASE_FEEDS_BUCKET", "posts"),
        ]))
        .unwrap();
        assert_eq!(env.supabase_url, "https://db.example.co");
        assert_eq!(env.feeds_bucket, "posts");
        assert_eq!(env.profiles_bucket, "profiles");
        assert_eq!(env.app_id, None);
    }

    #[test]
    fn test_server_name_wins() {
        let env = BackendEnv::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://server.example.co"),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://public.example.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "secret"),
            ("SUPABASE_FEEDS_BUCKET", " "),
        ]))
        .unwrap();
        assert_eq!(env.supabase_url, "https://server.example.co");
        assert_eq!(env.feeds_bucket, "feeds");
    }

    #[test]
    fn test_missing_credentials() {
        let err = BackendEnv::from_lookup(lookup(&[("SUPABASE_URL", "https://x.co")]));
        assert!(matches!(err, Err(AppError::Config(_))));
    }
}
