// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! Virtual cameras that render a deterministic test pattern. Used for the CLI
//! `--virtual` flag and throughout the tests, where failures can be injected:
//! denied permission, a missing back camera, streams that never become ready
//! and streams that start delivering blank frames.
//!
//! Frame delivery is derived from elapsed time on the tokio clock, so tests
//! running with a paused clock see frames arrive as time is advanced.

use super::types::*;
use super::{MediaBackend, VideoStream, select_device};
use crate::errors::MediaError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Nominal frame period of a synthetic camera (~30 fps)
const FRAME_PERIOD: Duration = Duration::from_millis(33);

/// One virtual camera
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    pub id: String,
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Offsets the red channel so two cameras never produce identical frames
    pub seed: u8,
    never_ready: bool,
    blank_after: Option<Duration>,
}

impl SyntheticCamera {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            width: 64,
            height: 48,
            seed: 0,
            never_ready: false,
            blank_after: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_seed(mut self, seed: u8) -> Self {
        self.seed = seed;
        self
    }

    /// The stream opens but never delivers a frame
    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    /// The stream delivers zero-sized frames once `after` has elapsed
    pub fn blank_after(mut self, after: Duration) -> Self {
        self.blank_after = Some(after);
        self
    }

    /// Test pattern value at (x, y)
    pub fn pattern_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        [
            (x.wrapping_mul(7).wrapping_add(self.seed as u32) & 0xff) as u8,
            (y.wrapping_mul(13) & 0xff) as u8,
            ((x + y).wrapping_mul(3) & 0xff) as u8,
            255,
        ]
    }

    /// Render the full test pattern
    pub fn render(&self, sequence: u64) -> CameraFrame {
        let mut data = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.extend_from_slice(&self.pattern_pixel(x, y));
            }
        }
        CameraFrame::from_rgba(self.width, self.height, data, sequence)
    }

    fn device(&self) -> CameraDevice {
        CameraDevice::new(self.id.clone(), self.label.clone())
    }
}

#[derive(Debug, Default)]
struct StreamCounters {
    active: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
}

/// Backend serving [`SyntheticCamera`]s
#[derive(Debug)]
pub struct SyntheticBackend {
    cameras: Vec<SyntheticCamera>,
    permission_denied: bool,
    insecure: bool,
    counters: Arc<StreamCounters>,
    /// Device ids currently forced to deliver blank frames
    blank: Arc<Mutex<HashSet<String>>>,
}

impl SyntheticBackend {
    pub fn new(cameras: Vec<SyntheticCamera>) -> Self {
        Self {
            cameras,
            permission_denied: false,
            insecure: false,
            counters: Arc::new(StreamCounters::default()),
            blank: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// A phone with a labelled front and back camera
    pub fn phone() -> Self {
        Self::new(vec![
            SyntheticCamera::new("synthetic-front", "Front Camera").with_seed(0),
            SyntheticCamera::new("synthetic-back", "Back Camera").with_seed(101),
        ])
    }

    /// A laptop-like device with only a user-facing camera
    pub fn front_only() -> Self {
        Self::new(vec![SyntheticCamera::new("synthetic-front", "Front Camera")])
    }

    /// Every stream request is refused
    pub fn deny_permission(mut self) -> Self {
        self.permission_denied = true;
        self
    }

    /// The environment check fails as if not served over a secure connection
    pub fn insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    pub fn cameras(&self) -> &[SyntheticCamera] {
        &self.cameras
    }

    pub fn camera(&self, id: &str) -> Option<&SyntheticCamera> {
        self.cameras.iter().find(|c| c.id == id)
    }

    /// Force a device to deliver blank frames (or stop doing so)
    pub fn set_blank(&self, id: &str, blank: bool) {
        let mut set = self.blank.lock();
        if blank {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    /// Streams currently open
    pub fn active_streams(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open streams seen so far
    pub fn peak_active_streams(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Total successful stream requests
    pub fn open_count(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }
}

impl MediaBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn check_environment(&self) -> BackendResult<()> {
        if self.insecure {
            return Err(MediaError::InsecureContext);
        }
        if self.cameras.is_empty() {
            return Err(MediaError::Unsupported);
        }
        Ok(())
    }

    fn enumerate_devices(&self) -> BackendResult<Vec<CameraDevice>> {
        Ok(self.cameras.iter().map(SyntheticCamera::device).collect())
    }

    fn open(&self, constraints: &VideoConstraints) -> BackendResult<OpenedStream> {
        if self.permission_denied {
            return Err(MediaError::PermissionDenied);
        }

        let devices = self.enumerate_devices()?;
        let device = select_device(&devices, constraints)?.clone();
        let camera = self
            .camera(&device.id)
            .cloned()
            .ok_or_else(|| MediaError::Backend(format!("unknown device {}", device.id)))?;

        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(active, Ordering::SeqCst);
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        debug!(device = %device.id, active, "Synthetic stream opened");

        Ok(OpenedStream {
            device,
            stream: Box::new(SyntheticStream {
                camera,
                opened_at: Instant::now(),
                active: true,
                counters: Arc::clone(&self.counters),
                blank: Arc::clone(&self.blank),
            }),
        })
    }
}

struct SyntheticStream {
    camera: SyntheticCamera,
    opened_at: Instant,
    active: bool,
    counters: Arc<StreamCounters>,
    blank: Arc<Mutex<HashSet<String>>>,
}

impl SyntheticStream {
    fn is_blank(&self) -> bool {
        if self.blank.lock().contains(&self.camera.id) {
            return true;
        }
        self.camera
            .blank_after
            .map(|after| self.opened_at.elapsed() >= after)
            .unwrap_or(false)
    }
}

impl VideoStream for SyntheticStream {
    fn latest_frame(&self) -> Option<Arc<CameraFrame>> {
        let delivered = self.frames_delivered();
        if delivered == 0 {
            return None;
        }
        if self.is_blank() {
            return Some(Arc::new(CameraFrame::empty(delivered)));
        }
        Some(Arc::new(self.camera.render(delivered)))
    }

    fn frames_delivered(&self) -> u64 {
        if !self.active || self.camera.never_ready {
            return 0;
        }
        let elapsed = self.opened_at.elapsed().as_millis() / FRAME_PERIOD.as_millis();
        elapsed as u64 + 1
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.counters.active.fetch_sub(1, Ordering::SeqCst);
            debug!(device = %self.camera.id, "Synthetic stream stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
