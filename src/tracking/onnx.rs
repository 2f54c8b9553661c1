// SPDX-License-Identifier: GPL-3.0-only

//! Face detector backed by ONNX Runtime
//!
//! Runs a box detector over the whole frame, then an optional 68-point
//! landmark model over each face. Landmarks become the keypoints that drive
//! the mask's roll.

use super::inference::{
    decode_detections, detector_input, face_keypoints, landmark_crop, landmark_input,
    non_max_suppression,
};
use super::{DetectorFactory, FaceDetector, FaceRegion};
use crate::backends::camera::CameraFrame;
use crate::constants::face_model::{
    CROP_MARGIN, DETECTOR_INPUT, IOU_THRESHOLD, LANDMARK_INPUT, SCORE_THRESHOLD,
};
use crate::errors::TrackingError;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn load_session(path: &Path) -> Result<Session, TrackingError> {
    Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| TrackingError::Unavailable(format!("{}: {}", path.display(), e)))
}

fn failed(e: ort::Error) -> TrackingError {
    TrackingError::DetectionFailed(e.to_string())
}

/// Run `session` on one f32 tensor and copy out the first `outputs` results
fn run(
    session: &mut Session,
    shape: [usize; 4],
    data: Vec<f32>,
    outputs: usize,
) -> Result<Vec<Vec<f32>>, TrackingError> {
    let input = Tensor::from_array((shape, data)).map_err(failed)?;
    let results = session.run(ort::inputs![input]).map_err(failed)?;
    (0..outputs)
        .map(|i| {
            let (_, values) = results[i].try_extract_tensor::<f32>().map_err(failed)?;
            Ok(values.to_vec())
        })
        .collect()
}

/// Face boxes from an anchor-based detector, keypoints from a landmark model
pub struct OnnxFaceDetector {
    faces: Session,
    landmarks: Option<Session>,
}

impl OnnxFaceDetector {
    /// Load the models. Without a landmark model faces carry no keypoints
    /// and masks stay upright.
    pub fn load(face_model: &Path, landmark_model: Option<&Path>) -> Result<Self, TrackingError> {
        let faces = load_session(face_model)?;
        let landmarks = landmark_model.map(load_session).transpose()?;
        info!(
            face_model = %face_model.display(),
            landmarks = landmarks.is_some(),
            "Face models loaded"
        );
        Ok(Self { faces, landmarks })
    }

    fn add_keypoints(&mut self, frame: &CameraFrame, region: &mut FaceRegion) {
        let Some(session) = self.landmarks.as_mut() else {
            return;
        };
        let crop = landmark_crop(&region.bbox, frame.width, frame.height, CROP_MARGIN);
        let Some(input) = landmark_input(frame, crop, LANDMARK_INPUT) else {
            return;
        };
        let side = LANDMARK_INPUT as usize;
        match run(session, [1, side, side, 3], input, 1) {
            Ok(outputs) => {
                if let Some(keypoints) = face_keypoints(&outputs[0], crop) {
                    region.keypoints = keypoints;
                }
            }
            // The box is still usable, the mask just stays upright
            Err(e) => debug!(error = %e, "Landmark inference failed"),
        }
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(
        &mut self,
        frame: &CameraFrame,
        _timestamp_ms: u64,
    ) -> Result<Vec<FaceRegion>, TrackingError> {
        let (width, height) = DETECTOR_INPUT;
        let input = detector_input(frame, width, height).ok_or_else(|| {
            TrackingError::DetectionFailed(format!(
                "frame buffer does not match {}x{}",
                frame.width, frame.height
            ))
        })?;

        let outputs = run(
            &mut self.faces,
            [1, 3, height as usize, width as usize],
            input,
            2,
        )?;
        let regions = decode_detections(
            &outputs[0],
            &outputs[1],
            frame.width,
            frame.height,
            SCORE_THRESHOLD,
        );
        let mut regions = non_max_suppression(regions, IOU_THRESHOLD);
        for region in &mut regions {
            self.add_keypoints(frame, region);
        }
        Ok(regions)
    }

    fn close(&mut self) {
        // Sessions free their resources on drop
        self.landmarks = None;
    }
}

/// Load the models off the async runtime
pub fn onnx_factory(face_model: PathBuf, landmark_model: Option<PathBuf>) -> DetectorFactory {
    Box::new(move || {
        Box::pin(async move {
            let loaded = tokio::task::spawn_blocking(move || {
                OnnxFaceDetector::load(&face_model, landmark_model.as_deref())
            })
            .await
            .map_err(|e| TrackingError::Unavailable(e.to_string()))?;
            match loaded {
                Ok(detector) => Ok(Box::new(detector) as Box<dyn FaceDetector>),
                Err(e) => {
                    warn!(error = %e, "Face models failed to load");
                    Err(e)
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_model_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let factory = onnx_factory(dir.path().join("faces.onnx"), None);
        let result = factory().await;
        assert!(matches!(result, Err(TrackingError::Unavailable(_))));
    }
}
