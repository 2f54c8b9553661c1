// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use ping::Config;
use ping::config::BackendEnv;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.default_mask, "popcat");
    assert_eq!(config.capture_settle_delay(), Duration::from_millis(400));
    assert!(config.face_model.is_none());
    assert!(!config.api_base_url.is_empty());
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"capture_settle_delay_ms": 50, "default_mask": "cat"}"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.capture_settle_delay(), Duration::from_millis(50));
    assert_eq!(config.default_mask, "cat");
    assert_eq!(config.frame_interval_ms, Config::default().frame_interval_ms);
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let config = Config {
        api_base_url: "https://ping.example".to_string(),
        face_model: Some(dir.path().join("faces.onnx")),
        landmark_model: Some(dir.path().join("marks.onnx")),
        ..Config::default()
    };

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_backend_env_requires_url_and_key() {
    let missing = BackendEnv::from_lookup(|key| {
        (key == "SUPABASE_URL").then(|| "https://db.example.co".to_string())
    });
    assert!(missing.is_err());

    let env = BackendEnv::from_lookup(|key| match key {
        "NEXT_PUBLIC_SUPABASE_URL" => Some("https://db.example.co/".to_string()),
        "SUPABASE_SERVICE_ROLE_KEY" => Some("service".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(env.supabase_url, "https://db.example.co");
    assert_eq!(env.feeds_bucket, "feeds");
    assert_eq!(env.profiles_bucket, "profiles");
}
