// SPDX-License-Identifier: GPL-3.0-only

//! Tensor layout and post-processing for the face models
//!
//! The detector takes a resized, normalized CHW frame and returns per-anchor
//! scores and corner boxes in `[0, 1]`. The landmark model takes a square HWC
//! crop around one face and returns 68 points in crop-relative coordinates.
//! Everything here is plain arithmetic so it can be tested without a runtime.

use super::{BoundingBox, FaceRegion, Keypoint};
use crate::backends::camera::CameraFrame;
use crate::constants::face_model::{LANDMARK_COUNT, PIXEL_MEAN, PIXEL_STD};
use image::{RgbaImage, imageops};

/// Square region of the frame fed to the landmark model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub side: u32,
}

fn frame_image(frame: &CameraFrame) -> Option<RgbaImage> {
    RgbaImage::from_raw(frame.width, frame.height, frame.data.to_vec())
}

/// Resize the frame and lay it out as normalized RGB planes
pub fn detector_input(frame: &CameraFrame, width: u32, height: u32) -> Option<Vec<f32>> {
    let image = frame_image(frame)?;
    let resized = imageops::resize(&image, width, height, imageops::FilterType::Triangle);

    let plane = (width * height) as usize;
    let mut planes = vec![0.0; plane * 3];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            planes[c * plane + i] = (pixel[c] as f32 - PIXEL_MEAN) / PIXEL_STD;
        }
    }
    Some(planes)
}

/// Turn raw detector output into face regions in frame pixels
///
/// `scores` holds `[background, face]` pairs and `boxes` holds normalized
/// `[x1, y1, x2, y2]` corners, one entry per anchor.
pub fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    frame_width: u32,
    frame_height: u32,
    threshold: f32,
) -> Vec<FaceRegion> {
    let (fw, fh) = (frame_width as f32, frame_height as f32);
    scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(score, _)| score[1] >= threshold)
        .filter_map(|(score, corners)| {
            let x1 = corners[0].clamp(0.0, 1.0) * fw;
            let y1 = corners[1].clamp(0.0, 1.0) * fh;
            let x2 = corners[2].clamp(0.0, 1.0) * fw;
            let y2 = corners[3].clamp(0.0, 1.0) * fh;
            if x2 <= x1 || y2 <= y1 {
                return None;
            }
            let mut region = FaceRegion::new(BoundingBox::new(x1, y1, x2 - x1, y2 - y1));
            region.score = score[1];
            Some(region)
        })
        .collect()
}

/// Intersection over union of two boxes
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.origin_x.max(b.origin_x);
    let y1 = a.origin_y.max(b.origin_y);
    let x2 = (a.origin_x + a.width).min(b.origin_x + b.width);
    let y2 = (a.origin_y + a.height).min(b.origin_y + b.height);
    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Keep the strongest of each group of overlapping faces, best first
pub fn non_max_suppression(mut regions: Vec<FaceRegion>, threshold: f32) -> Vec<FaceRegion> {
    regions.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<FaceRegion> = Vec::new();
    for region in regions {
        if kept.iter().all(|k| iou(&k.bbox, &region.bbox) <= threshold) {
            kept.push(region);
        }
    }
    kept
}

/// Square crop around a face box, grown by `margin` and kept inside the frame
pub fn landmark_crop(bbox: &BoundingBox, frame_width: u32, frame_height: u32, margin: f32) -> Crop {
    let (cx, cy) = bbox.center();
    let side = (bbox.max_side() * (1.0 + margin))
        .round()
        .clamp(1.0, frame_width.min(frame_height).max(1) as f32) as u32;
    let half = side as f32 / 2.0;
    let x = (cx - half).round().clamp(0.0, frame_width.saturating_sub(side) as f32) as u32;
    let y = (cy - half).round().clamp(0.0, frame_height.saturating_sub(side) as f32) as u32;
    Crop { x, y, side }
}

/// Cut the crop out of the frame as an HWC RGB tensor of `size` x `size`
pub fn landmark_input(frame: &CameraFrame, crop: Crop, size: u32) -> Option<Vec<f32>> {
    let image = frame_image(frame)?;
    let cropped = imageops::crop_imm(&image, crop.x, crop.y, crop.side, crop.side).to_image();
    let resized = imageops::resize(&cropped, size, size, imageops::FilterType::Triangle);
    Some(
        resized
            .pixels()
            .flat_map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect(),
    )
}

fn centroid(points: &[Keypoint]) -> Keypoint {
    let n = points.len().max(1) as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Keypoint::new(sx / n, sy / n)
}

/// Reduce 68 crop-relative landmarks to six frame keypoints
///
/// The order is right eye, left eye, nose tip, mouth, right jaw end and left
/// jaw end. The jaw ends sit by the ears, so they are the horizontal extremes
/// [`super::roll_angle`] measures between.
pub fn face_keypoints(marks: &[f32], crop: Crop) -> Option<Vec<Keypoint>> {
    if marks.len() < LANDMARK_COUNT * 2 {
        return None;
    }
    let side = crop.side as f32;
    let points: Vec<Keypoint> = marks[..LANDMARK_COUNT * 2]
        .chunks_exact(2)
        .map(|p| Keypoint::new(crop.x as f32 + p[0] * side, crop.y as f32 + p[1] * side))
        .collect();

    Some(vec![
        centroid(&points[36..42]),
        centroid(&points[42..48]),
        points[30],
        centroid(&points[48..68]),
        points[0],
        points[16],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::roll_angle;

    fn frame(width: u32, height: u32, rgba: [u8; 4]) -> CameraFrame {
        let data = rgba.repeat((width * height) as usize);
        CameraFrame::from_rgba(width, height, data, 0)
    }

    #[test]
    fn test_detector_input_is_planar_and_normalized() {
        let input = detector_input(&frame(8, 6, [255, 127, 0, 255]), 4, 2).unwrap();
        assert_eq!(input.len(), 4 * 2 * 3);
        assert!(input[..8].iter().all(|v| (*v - 1.0).abs() < 0.01));
        assert!(input[8..16].iter().all(|v| v.abs() < 0.01));
        assert!(input[16..].iter().all(|v| (*v + 127.0 / 128.0).abs() < 0.01));
    }

    #[test]
    fn test_detector_input_rejects_short_buffer() {
        let broken = CameraFrame::from_rgba(4, 4, vec![0; 10], 0);
        assert!(detector_input(&broken, 2, 2).is_none());
    }

    #[test]
    fn test_decode_and_suppress() {
        let scores = [0.9, 0.1, 0.2, 0.8, 0.1, 0.9, 0.3, 0.7];
        let boxes = [
            0.0, 0.0, 0.5, 0.5, // below threshold
            0.1, 0.1, 0.5, 0.5,
            0.12, 0.1, 0.5, 0.52, // overlaps the previous one
            0.6, 0.6, 0.9, 0.9,
        ];
        let regions = decode_detections(&scores, &boxes, 100, 200, 0.5);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].bbox, BoundingBox::new(10.0, 20.0, 40.0, 80.0));

        let kept = non_max_suppression(regions, 0.4);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.7);
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(iou(&a, &a), 1.0);
        assert_eq!(iou(&a, &BoundingBox::new(20.0, 0.0, 10.0, 10.0)), 0.0);
        let half = iou(&a, &BoundingBox::new(5.0, 0.0, 10.0, 10.0));
        assert!((half - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_landmark_crop_stays_in_frame() {
        let crop = landmark_crop(&BoundingBox::new(40.0, 30.0, 20.0, 10.0), 100, 80, 0.2);
        assert_eq!(crop, Crop { x: 38, y: 23, side: 24 });

        let edge = landmark_crop(&BoundingBox::new(90.0, 70.0, 20.0, 20.0), 100, 80, 0.2);
        assert_eq!(edge, Crop { x: 76, y: 56, side: 24 });

        let huge = landmark_crop(&BoundingBox::new(0.0, 0.0, 500.0, 500.0), 100, 80, 0.2);
        assert_eq!(huge, Crop { x: 20, y: 0, side: 80 });
    }

    #[test]
    fn test_landmark_input_layout() {
        let input = landmark_input(&frame(10, 10, [10, 20, 30, 255]), Crop { x: 2, y: 2, side: 4 }, 2)
            .unwrap();
        assert_eq!(input, vec![10.0, 20.0, 30.0].repeat(4));
    }

    #[test]
    fn test_tilted_landmarks_give_roll() {
        // Points along a 45 degree line across the crop
        let marks: Vec<f32> = (0..LANDMARK_COUNT)
            .flat_map(|i| {
                let t = i as f32 / (LANDMARK_COUNT - 1) as f32;
                [t, t]
            })
            .collect();
        let crop = Crop { x: 100, y: 50, side: 40 };
        let keypoints = face_keypoints(&marks, crop).unwrap();
        assert_eq!(keypoints.len(), 6);
        assert_eq!(keypoints[4], Keypoint::new(100.0, 50.0));
        assert!((roll_angle(&keypoints).to_degrees() - 45.0).abs() < 1e-3);

        assert!(face_keypoints(&marks[..100], crop).is_none());
    }
}
