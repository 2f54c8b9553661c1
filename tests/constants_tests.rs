// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use ping::constants::{JpegQualityPreset, extension_for_mime, feed, handoff, mime_for_extension};

#[test]
fn test_quality_preset_values() {
    assert_eq!(JpegQualityPreset::ALL.len(), 3);
}

#[test]
fn test_quality_preset_ordering() {
    // Presets are ordered from lowest to highest quality
    let mut prev = 0u8;
    for preset in JpegQualityPreset::ALL {
        assert!(preset.quality() > prev);
        assert!(preset.quality() <= 100);
        prev = preset.quality();
    }
}

#[test]
fn test_quality_preset_display_names() {
    for preset in JpegQualityPreset::ALL {
        assert!(!preset.display_name().is_empty());
    }
}

#[test]
fn test_supported_mime_types() {
    assert_eq!(extension_for_mime("image/jpeg"), Some("jpg"));
    assert_eq!(extension_for_mime("IMAGE/PNG"), Some("png"));
    assert_eq!(extension_for_mime("image/webp"), Some("webp"));
    assert_eq!(extension_for_mime("image/gif"), None);
    assert_eq!(mime_for_extension("webp"), "image/webp");
}

#[test]
fn test_handoff_keys_are_distinct() {
    assert_ne!(handoff::STORAGE_KEY_FRONT, handoff::STORAGE_KEY_BACK);
    assert!(feed::DEFAULT_LIMIT <= feed::MAX_LIMIT);
    assert_eq!(feed::PAGE_SIZE, 3);
}
