// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Talks to `/dev/video*` through the v4l crate. Each stream owns a capture
//! thread that dequeues memory-mapped buffers, converts them to RGBA and
//! publishes the latest frame into a shared slot.

use super::format_converters::{gray_to_rgba, rgb_to_rgba, uyvy_to_rgba, yuyv_to_rgba};
use super::types::*;
use super::{MediaBackend, VideoStream, select_device};
use crate::constants::timing;
use crate::errors::MediaError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Requested capture size; drivers pick the closest they support
const REQUESTED_WIDTH: u32 = 1280;
const REQUESTED_HEIGHT: u32 = 720;

/// Formats in order of preference
const PREFERRED_FOURCCS: [&[u8; 4]; 5] = [b"MJPG", b"YUYV", b"UYVY", b"RGB3", b"GREY"];

/// Map an I/O error from the device to a media error
fn map_io_error(err: &std::io::Error, context: &str) -> MediaError {
    match err.raw_os_error() {
        Some(code) if code == libc::EACCES || code == libc::EPERM => MediaError::PermissionDenied,
        _ => MediaError::Backend(format!("{}: {}", context, err)),
    }
}

/// Backend for V4L2 capture devices
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for V4l2Backend {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn check_environment(&self) -> BackendResult<()> {
        match self.enumerate_devices() {
            Ok(devices) if devices.is_empty() => Err(MediaError::Unsupported),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn enumerate_devices(&self) -> BackendResult<Vec<CameraDevice>> {
        let entries = std::fs::read_dir("/dev").map_err(|e| map_io_error(&e, "read /dev"))?;

        let mut paths: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with("video"))
            .map(|name| format!("/dev/{}", name))
            .collect();
        paths.sort();

        let mut devices = Vec::new();
        let mut denied = false;
        for path in paths {
            let dev = match Device::with_path(&path) {
                Ok(dev) => dev,
                Err(e) => {
                    if matches!(map_io_error(&e, &path), MediaError::PermissionDenied) {
                        denied = true;
                    }
                    debug!(path = %path, error = %e, "Skipping video node");
                    continue;
                }
            };
            let caps = match dev.query_caps() {
                Ok(caps) => caps,
                Err(e) => {
                    debug!(path = %path, error = %e, "Could not query capabilities");
                    continue;
                }
            };
            // Metadata and output nodes share the videoN namespace
            if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                continue;
            }
            debug!(path = %path, card = %caps.card, "Found capture device");
            devices.push(CameraDevice::new(path, caps.card));
        }

        if devices.is_empty() && denied {
            return Err(MediaError::PermissionDenied);
        }
        Ok(devices)
    }

    fn open(&self, constraints: &VideoConstraints) -> BackendResult<OpenedStream> {
        let devices = self.enumerate_devices()?;
        let device = select_device(&devices, constraints)?.clone();
        let stream = V4l2Stream::start(&device.id)?;
        Ok(OpenedStream {
            device,
            stream: Box::new(stream),
        })
    }
}

/// State shared with the capture thread
#[derive(Default)]
struct SharedFrame {
    latest: Mutex<Option<Arc<CameraFrame>>>,
    delivered: AtomicU64,
}

/// A running V4L2 capture
pub struct V4l2Stream {
    device_path: String,
    shared: Arc<SharedFrame>,
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl V4l2Stream {
    /// Open the device and start its capture thread
    ///
    /// Returns once the device is configured and streaming, or with the error
    /// that prevented it.
    fn start(device_path: &str) -> BackendResult<Self> {
        let shared = Arc::new(SharedFrame::default());
        let running = Arc::new(AtomicBool::new(true));
        let (startup_tx, startup_rx) = mpsc::channel();

        let path = device_path.to_string();
        let shared_clone = Arc::clone(&shared);
        let running_clone = Arc::clone(&running);
        let thread_handle = std::thread::Builder::new()
            .name("ping-v4l2".to_string())
            .spawn(move || {
                if let Err(e) = capture_loop(&path, shared_clone, running_clone, startup_tx) {
                    error!(device_path = %path, error = %e, "Capture loop failed");
                }
            })
            .map_err(|e| MediaError::Backend(format!("spawn capture thread: {}", e)))?;

        let mut stream = Self {
            device_path: device_path.to_string(),
            shared,
            running,
            thread_handle: Some(thread_handle),
        };

        match startup_rx.recv_timeout(timing::READY_TIMEOUT) {
            Ok(Ok(())) => Ok(stream),
            Ok(Err(e)) => {
                stream.stop();
                Err(e)
            }
            Err(_) => {
                stream.stop();
                Err(MediaError::Backend(format!(
                    "{} did not start streaming",
                    device_path
                )))
            }
        }
    }
}

impl VideoStream for V4l2Stream {
    fn latest_frame(&self) -> Option<Arc<CameraFrame>> {
        self.shared.latest.lock().clone()
    }

    fn frames_delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            info!(device_path = %self.device_path, "Stopping V4L2 capture");
            if handle.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode one buffer into RGBA
fn decode_buffer(
    fourcc: &[u8; 4],
    buf: &[u8],
    width: u32,
    height: u32,
) -> Option<(u32, u32, Vec<u8>)> {
    let rgba = match fourcc {
        // Size comes from the JPEG header, not the negotiated format
        b"MJPG" => {
            return match image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg) {
                Ok(img) => {
                    let rgba = img.to_rgba8();
                    Some((rgba.width(), rgba.height(), rgba.into_raw()))
                }
                Err(e) => {
                    debug!(error = %e, "Dropping undecodable MJPEG frame");
                    None
                }
            };
        }
        b"YUYV" => yuyv_to_rgba(buf, width, height),
        b"UYVY" => uyvy_to_rgba(buf, width, height),
        b"RGB3" => rgb_to_rgba(buf),
        b"GREY" => gray_to_rgba(buf, width, height),
        _ => return None,
    };
    Some((width, height, rgba))
}

/// Capture loop running in its own thread
fn capture_loop(
    device_path: &str,
    shared: Arc<SharedFrame>,
    running: Arc<AtomicBool>,
    startup: mpsc::Sender<BackendResult<()>>,
) -> Result<(), MediaError> {
    let fail = |err: MediaError| {
        let _ = startup.send(Err(err.clone()));
        err
    };

    let mut dev = Device::with_path(device_path)
        .map_err(|e| fail(map_io_error(&e, &format!("open {}", device_path))))?;

    let mut format = dev
        .format()
        .map_err(|e| fail(map_io_error(&e, "query format")))?;

    let supported: Vec<[u8; 4]> = dev
        .enum_formats()
        .map(|formats| formats.into_iter().map(|f| f.fourcc.repr).collect())
        .unwrap_or_default();
    if let Some(fourcc) = PREFERRED_FOURCCS
        .iter()
        .find(|fourcc| supported.iter().any(|s| *s == ***fourcc))
    {
        format.fourcc = v4l::FourCC::new(*fourcc);
    }
    format.width = REQUESTED_WIDTH;
    format.height = REQUESTED_HEIGHT;

    let format = match dev.set_format(&format) {
        Ok(applied) => applied,
        Err(e) => {
            warn!(error = %e, "Could not set format, using current device format");
            dev.format()
                .map_err(|e| fail(map_io_error(&e, "query format")))?
        }
    };

    let fourcc = format.fourcc.repr;
    if !PREFERRED_FOURCCS.iter().any(|f| **f == fourcc) {
        return Err(fail(MediaError::Backend(format!(
            "unsupported pixel format {:?}",
            format.fourcc
        ))));
    }
    let (width, height) = (format.width, format.height);
    info!(device_path, width, height, fourcc = ?format.fourcc, "V4L2 format configured");

    let mut stream = MmapStream::with_buffers(&mut dev, Type::VideoCapture, 4)
        .map_err(|e| fail(map_io_error(&e, "create buffer stream")))?;

    let _ = startup.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        match stream.next() {
            Ok((buf, meta)) => {
                let Some((frame_width, frame_height, rgba)) =
                    decode_buffer(&fourcc, buf, width, height)
                else {
                    continue;
                };
                let frame =
                    CameraFrame::from_rgba(frame_width, frame_height, rgba, meta.sequence as u64);
                *shared.latest.lock() = Some(Arc::new(frame));
                let delivered = shared.delivered.fetch_add(1, Ordering::SeqCst) + 1;
                if delivered % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(device_path, delivered, "V4L2 frames delivered");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to dequeue frame");
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        }
    }

    info!(device_path, "V4L2 capture loop ended");
    Ok(())
}
