// SPDX-License-Identifier: GPL-3.0-only

//! Ping! - dual-camera photos with face-tracked masks
//!
//! The capture side takes a front (selfie) photo and a back (scene) photo in
//! one shutter press, draws the selected mask over every detected face, and
//! hands the pair to a review step that publishes it to the feed. The service
//! side is a small REST proxy in front of the hosted database.
//!
//! # Architecture
//!
//! - [`backends`]: camera devices, constraint negotiation and stream lifecycle
//! - [`tracking`]: face detection cadence
//! - [`compositor`]: mask overlay rendering
//! - [`pipelines`]: frame to JPEG data URI capture
//! - [`capture`]: shutter sequencing, capture screen and review handoff
//! - [`api`]: REST client, publish gateway and feed loader
//! - [`server`]: the REST proxy (`ping serve`)
//! - [`config`]: user configuration and service environment
//! - [`storage`]: object storage URLs

pub mod api;
pub mod backends;
pub mod capture;
pub mod compositor;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod server;
pub mod storage;
pub mod tracking;

// Re-export commonly used types
pub use backends::camera::{DeviceMediaAccess, Facing};
pub use capture::{CaptureScreen, CaptureSequencer, CapturedPhotoPair, Route, ShutterOutcome};
pub use config::Config;
pub use constants::JpegQualityPreset;
pub use errors::{AppError, AppResult};
