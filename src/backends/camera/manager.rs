// SPDX-License-Identifier: GPL-3.0-only

//! Camera session lifecycle manager
//!
//! The manager provides:
//! - Exclusive ownership of the single active camera session
//! - Strictly sequential facing transitions (stop, settle, negotiate, wait ready)
//! - Thread-safe access to the latest frame for the compositor and the sequencer

use super::negotiation;
use super::types::*;
use super::{MediaBackend, VideoStream};
use crate::config::Config;
use crate::constants::{readiness, timing};
use crate::errors::MediaError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timing knobs for stream transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaTiming {
    /// Pause between stopping the previous stream and requesting a new one
    pub stream_settle_delay: Duration,
    /// Upper bound for a new stream to become ready
    pub ready_timeout: Duration,
    /// Readiness polling interval
    pub ready_poll_interval: Duration,
}

impl Default for MediaTiming {
    fn default() -> Self {
        Self {
            stream_settle_delay: timing::STREAM_SETTLE_DELAY,
            ready_timeout: timing::READY_TIMEOUT,
            ready_poll_interval: timing::READY_POLL_INTERVAL,
        }
    }
}

impl From<&Config> for MediaTiming {
    fn from(config: &Config) -> Self {
        Self {
            stream_settle_delay: Duration::from_millis(config.stream_settle_delay_ms),
            ready_timeout: Duration::from_millis(config.ready_timeout_ms),
            ready_poll_interval: Duration::from_millis(config.ready_poll_interval_ms),
        }
    }
}

/// Device media access
///
/// Owns at most one [`CameraSession`]. Cloning shares the same session.
#[derive(Clone)]
pub struct DeviceMediaAccess {
    backend: Arc<dyn MediaBackend>,
    session: Arc<Mutex<Option<CameraSession>>>,
    /// Serializes acquire/release so transitions never interleave
    transition: Arc<tokio::sync::Mutex<()>>,
    timing: MediaTiming,
}

impl DeviceMediaAccess {
    /// Create a manager over a backend with default timing
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self::with_timing(backend, MediaTiming::default())
    }

    /// Create a manager with custom timing
    pub fn with_timing(backend: Arc<dyn MediaBackend>, timing: MediaTiming) -> Self {
        info!(backend = backend.name(), "Creating device media access");
        Self {
            backend,
            session: Arc::new(Mutex::new(None)),
            transition: Arc::new(tokio::sync::Mutex::new(())),
            timing,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn timing(&self) -> MediaTiming {
        self.timing
    }

    /// Enumerate devices through the backend
    pub fn enumerate_devices(&self) -> BackendResult<Vec<CameraDevice>> {
        self.backend.check_environment()?;
        self.backend.enumerate_devices()
    }

    /// Acquire a ready session for `facing`
    ///
    /// Any previous session is stopped first. On error no session is active.
    pub async fn acquire(&self, facing: Facing) -> BackendResult<CameraSessionInfo> {
        let _transition = self.transition.lock().await;
        info!(%facing, "Acquiring camera session");

        self.backend.check_environment()?;

        if self.stop_active() {
            tokio::time::sleep(self.timing.stream_settle_delay).await;
        }

        let backend = Arc::clone(&self.backend);
        let opened = tokio::task::spawn_blocking(move || negotiation::negotiate(&*backend, facing))
            .await
            .map_err(|e| MediaError::Backend(format!("stream request task failed: {}", e)))??;

        let mut session = CameraSession::new(facing, opened);

        if let Err(e) = wait_until_ready(session.stream(), &self.timing).await {
            session.set_readiness(Readiness::Failed);
            warn!(%facing, error = %e, "Camera stream never became ready");
            // Dropping the session stops the stream
            return Err(e);
        }

        session.set_readiness(Readiness::Ready);
        let info = session.info();
        info!(
            %facing,
            device = %info.device.label,
            width = info.width,
            height = info.height,
            "Camera session ready"
        );

        *self.session.lock() = Some(session);
        Ok(info)
    }

    /// Stop the active session, if any
    pub async fn release(&self) {
        let _transition = self.transition.lock().await;
        if self.stop_active() {
            info!("Camera session released");
        }
    }

    /// Stop the active session without waiting for an in-flight transition
    ///
    /// Used on teardown paths that cannot await.
    pub fn release_now(&self) {
        self.stop_active();
    }

    fn stop_active(&self) -> bool {
        // Take the session out before dropping it so the lock is not held
        // while the backend stops the stream
        let previous = self.session.lock().take();
        match previous {
            Some(session) => {
                debug!(facing = %session.facing(), "Stopping previous camera session");
                drop(session);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the active session
    pub fn current_session(&self) -> Option<CameraSessionInfo> {
        self.session.lock().as_ref().map(CameraSession::info)
    }

    /// Facing of the active session
    pub fn facing(&self) -> Option<Facing> {
        self.session.lock().as_ref().map(CameraSession::facing)
    }

    /// True if a ready session with this facing is active
    pub fn is_ready(&self, facing: Facing) -> bool {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.facing() == facing && s.readiness() == Readiness::Ready)
            .unwrap_or(false)
    }

    /// Latest frame of the active session
    pub fn current_frame(&self) -> Option<Arc<CameraFrame>> {
        self.session
            .lock()
            .as_ref()
            .and_then(|s| s.stream().latest_frame())
    }
}

impl std::fmt::Debug for DeviceMediaAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMediaAccess")
            .field("backend", &self.backend.name())
            .field("session", &*self.session.lock())
            .finish()
    }
}

/// True once a stream has non-zero frame dimensions and enough buffered frames
pub fn stream_is_ready(stream: &dyn VideoStream) -> bool {
    let has_dimensions = stream
        .latest_frame()
        .map(|frame| !frame.is_empty())
        .unwrap_or(false);
    has_dimensions && stream.frames_delivered() >= readiness::MIN_BUFFERED_FRAMES
}

/// Poll a stream until it is ready or the timeout expires
pub async fn wait_until_ready(stream: &dyn VideoStream, timing: &MediaTiming) -> BackendResult<()> {
    let poll = async {
        loop {
            if stream_is_ready(stream) {
                return;
            }
            tokio::time::sleep(timing.ready_poll_interval).await;
        }
    };

    tokio::time::timeout(timing.ready_timeout, poll)
        .await
        .map_err(|_| MediaError::ReadinessTimeout {
            timeout_ms: timing.ready_timeout.as_millis() as u64,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{SyntheticBackend, SyntheticCamera};

    fn manager(backend: &Arc<SyntheticBackend>) -> DeviceMediaAccess {
        DeviceMediaAccess::new(backend.clone() as Arc<dyn MediaBackend>)
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_front_is_ready_and_mirrored() {
        let backend = Arc::new(SyntheticBackend::phone());
        let media = manager(&backend);

        let info = media.acquire(Facing::Front).await.unwrap();
        assert!(info.is_ready());
        assert!(info.is_mirrored());
        assert!(info.width > 0 && info.height > 0);
        assert!(media.is_ready(Facing::Front));
        assert_eq!(backend.active_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_never_overlaps_streams() {
        let backend = Arc::new(SyntheticBackend::phone());
        let media = manager(&backend);

        for facing in [Facing::Front, Facing::Back, Facing::Front, Facing::Back] {
            media.acquire(facing).await.unwrap();
            assert_eq!(backend.active_streams(), 1);
        }
        assert_eq!(backend.peak_active_streams(), 1);
        assert_eq!(backend.open_count(), 4);

        media.release().await;
        assert_eq!(backend.active_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_timeout_leaves_nothing_active() {
        let backend = Arc::new(SyntheticBackend::new(vec![
            SyntheticCamera::new("cam-0", "Front Camera").never_ready(),
        ]));
        let media = manager(&backend);

        let err = media.acquire(Facing::Front).await.unwrap_err();
        assert!(matches!(err, MediaError::ReadinessTimeout { .. }));
        assert_eq!(backend.active_streams(), 0);
        assert!(media.current_session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_is_reported() {
        let backend = Arc::new(SyntheticBackend::phone().deny_permission());
        let media = manager(&backend);

        assert_eq!(
            media.acquire(Facing::Front).await,
            Err(MediaError::PermissionDenied)
        );
    }
}
