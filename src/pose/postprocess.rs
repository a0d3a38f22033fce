// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decoding of raw YOLO-pose output.
//!
//! The model emits one row per anchor: `cx, cy, w, h`, one score per class, then
//! 17 `(x, y, confidence)` keypoints. Exports differ in whether the tensor is
//! `[1, features, anchors]` or `[1, anchors, features]`; both are accepted.

use std::cmp::Ordering;

use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;

use crate::error::{AnalysisError, Result};
use crate::inference::InferenceConfig;
use crate::keypoint::{Keypoint, KeypointSet, NUM_KEYPOINTS, ScoreSet};
use crate::pose::preprocess::LetterboxResult;
use crate::pose::{PersonBox, PoseEstimate};

/// Values per keypoint: x, y, confidence.
const KPT_DIM: usize = 3;

/// Features taken by the keypoints of one person.
const KPT_FEATURES: usize = NUM_KEYPOINTS * KPT_DIM;

/// A person candidate before NMS.
#[derive(Debug, Clone)]
struct Candidate {
    bbox: [f32; 4],
    score: f32,
    keypoints: KeypointSet,
    scores: ScoreSet,
}

/// Decode a pose output tensor into people in original frame coordinates.
///
/// # Arguments
///
/// * `output` - Flat output data.
/// * `output_shape` - Output shape, `[1, F, N]`, `[1, N, F]` or 2D without batch.
/// * `letterbox` - Transform applied during preprocessing.
/// * `num_classes` - Class scores per anchor, from the model metadata.
/// * `config` - Detection threshold, NMS IoU and max detections.
///
/// # Errors
///
/// Returns [`AnalysisError::InferenceError`] if the tensor cannot hold pose rows.
pub fn decode_pose(
    output: &[f32],
    output_shape: &[usize],
    letterbox: &LetterboxResult,
    num_classes: usize,
    config: &InferenceConfig,
) -> Result<PoseEstimate> {
    let dims = match output_shape {
        [1, a, b] | [a, b] => (*a, *b),
        _ => {
            return Err(AnalysisError::InferenceError(format!(
                "Unexpected pose output shape {output_shape:?}"
            )));
        }
    };
    if output.is_empty() || dims.0 == 0 || dims.1 == 0 {
        return Ok(PoseEstimate::empty());
    }

    let min_features = 4 + 1 + KPT_FEATURES;
    let expected_features = 4 + num_classes.max(1) + KPT_FEATURES;
    let (a, b) = dims;
    let features_first = a == expected_features || (a < b && a >= min_features);
    let (num_features, anchors_first) = if features_first { (a, false) } else { (b, true) };
    if num_features < min_features {
        return Err(AnalysisError::InferenceError(format!(
            "Pose output has {num_features} features per anchor, expected at least {min_features}"
        )));
    }

    let view = ArrayView2::from_shape(dims, output)
        .map_err(|e| AnalysisError::InferenceError(format!("Invalid pose output: {e}")))?;
    // Row per anchor.
    let rows = if anchors_first { view } else { view.reversed_axes() };
    let num_classes = num_features - 4 - KPT_FEATURES;

    let candidates: Vec<Candidate> = (0..rows.len_of(Axis(0)))
        .into_par_iter()
        .filter_map(|i| {
            let row = rows.index_axis(Axis(0), i);
            let score = (4..4 + num_classes)
                .map(|c| row[c])
                .filter(|s| !s.is_nan())
                .fold(0.0_f32, f32::max);
            if score < config.confidence_threshold {
                return None;
            }

            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            let bbox = letterbox.unletterbox_box([
                cx - w / 2.0,
                cy - h / 2.0,
                cx + w / 2.0,
                cy + h / 2.0,
            ]);

            let mut keypoints = KeypointSet::undetected();
            let mut scores = ScoreSet::default();
            let kpt_start = 4 + num_classes;
            for k in 0..NUM_KEYPOINTS {
                let offset = kpt_start + k * KPT_DIM;
                keypoints.0[k] = letterbox.unletterbox(row[offset], row[offset + 1]);
                scores.0[k] = row[offset + 2];
            }

            Some(Candidate {
                bbox,
                score,
                keypoints,
                scores,
            })
        })
        .collect();

    let boxes: Vec<([f32; 4], f32)> = candidates.iter().map(|c| (c.bbox, c.score)).collect();
    let keep = nms(&boxes, config.iou_threshold);

    let mut estimate = PoseEstimate::empty();
    for &index in keep.iter().take(config.max_detections) {
        let candidate = &candidates[index];
        estimate.push(
            candidate.keypoints,
            candidate.scores,
            Some(PersonBox {
                xyxy: candidate.bbox,
                confidence: candidate.score,
            }),
        );
    }
    Ok(estimate)
}

/// Intersection over Union of two `[x1, y1, x2, y2]` boxes.
#[must_use]
pub fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);

    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Greedy Non-Maximum Suppression.
///
/// Returns indices of the kept boxes, highest score first.
#[must_use]
pub fn nms(boxes: &[([f32; 4], f32)], iou_threshold: f32) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..boxes.len()).collect();
    indices.sort_by(|&a, &b| {
        boxes[b]
            .1
            .partial_cmp(&boxes[a].1)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for (pos, &i) in indices.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &indices[pos + 1..] {
            if !suppressed[j] && calculate_iou(&boxes[i].0, &boxes[j].0) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn identity_letterbox() -> LetterboxResult {
        LetterboxResult {
            tensor: Array4::zeros((1, 3, 1, 1)),
            orig_shape: (640, 640),
            scale: (1.0, 1.0),
            padding: (0.0, 0.0),
        }
    }

    /// One anchor row in `[anchors, features]` layout.
    fn anchor(cx: f32, cy: f32, score: f32, kpt_conf: f32) -> Vec<f32> {
        let mut row = vec![cx, cy, 100.0, 200.0, score];
        for k in 0..NUM_KEYPOINTS {
            #[allow(clippy::cast_precision_loss)]
            row.extend([cx + k as f32, cy, kpt_conf]);
        }
        row
    }

    #[test]
    fn test_iou() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!((calculate_iou(&a, &a) - 1.0).abs() < 1e-6);
        assert!(calculate_iou(&a, &[20.0, 20.0, 30.0, 30.0]).abs() < 1e-6);
        let half = calculate_iou(&a, &[5.0, 0.0, 15.0, 10.0]);
        assert!((half - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_best_of_overlap() {
        let boxes = vec![
            ([0.0, 0.0, 10.0, 10.0], 0.6),
            ([1.0, 1.0, 11.0, 11.0], 0.9),
            ([50.0, 50.0, 60.0, 60.0], 0.7),
        ];
        assert_eq!(nms(&boxes, 0.45), vec![1, 2]);
        assert!(nms(&[], 0.45).is_empty());
    }

    #[test]
    fn test_decode_anchors_first() {
        let mut data = anchor(100.0, 300.0, 0.9, 0.8);
        data.extend(anchor(400.0, 300.0, 0.1, 0.8));
        let features = 5 + KPT_FEATURES;
        // Pad to more anchors than features so the layout is unambiguous.
        let anchors = features + 1;
        data.resize(anchors * features, 0.0);

        let estimate = decode_pose(
            &data,
            &[1, anchors, features],
            &identity_letterbox(),
            1,
            &InferenceConfig::default(),
        )
        .unwrap();

        assert_eq!(estimate.len(), 1);
        let (kps, scores) = estimate.primary().unwrap();
        assert_eq!(kps.0[0], Keypoint::new(100.0, 300.0));
        assert_eq!(kps.0[16], Keypoint::new(116.0, 300.0));
        assert!((scores.0[5] - 0.8).abs() < 1e-6);
        assert_eq!(estimate.boxes[0].xyxy, [50.0, 200.0, 150.0, 400.0]);
    }

    #[test]
    fn test_decode_features_first() {
        let features = 5 + KPT_FEATURES;
        let anchors = 100;
        let rows = [anchor(100.0, 300.0, 0.9, 0.8), anchor(105.0, 300.0, 0.7, 0.8)];

        // Transpose into [features, anchors].
        let mut data = vec![0.0_f32; features * anchors];
        for (a, row) in rows.iter().enumerate() {
            for (f, value) in row.iter().enumerate() {
                data[f * anchors + a] = *value;
            }
        }

        let estimate = decode_pose(
            &data,
            &[1, features, anchors],
            &identity_letterbox(),
            1,
            &InferenceConfig::default(),
        )
        .unwrap();

        // Second anchor overlaps the first and is suppressed.
        assert_eq!(estimate.len(), 1);
        assert!((estimate.boxes[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decode_fewer_anchors_than_features() {
        let features = 5 + KPT_FEATURES;
        let rows = [anchor(100.0, 300.0, 0.9, 0.8), anchor(400.0, 300.0, 0.8, 0.8)];

        let anchors_first: Vec<f32> = rows.concat();
        let estimate = decode_pose(
            &anchors_first,
            &[1, 2, features],
            &identity_letterbox(),
            1,
            &InferenceConfig::default(),
        )
        .unwrap();
        assert_eq!(estimate.len(), 2);
        assert_eq!(estimate.primary().unwrap().0.0[0], Keypoint::new(100.0, 300.0));

        let mut features_first = vec![0.0_f32; features * 2];
        for (a, row) in rows.iter().enumerate() {
            for (f, value) in row.iter().enumerate() {
                features_first[f * 2 + a] = *value;
            }
        }
        let estimate = decode_pose(
            &features_first,
            &[1, features, 2],
            &identity_letterbox(),
            1,
            &InferenceConfig::default(),
        )
        .unwrap();
        assert_eq!(estimate.len(), 2);
        assert!((estimate.boxes[1].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_bad_output() {
        let config = InferenceConfig::default();
        let lb = identity_letterbox();
        assert!(decode_pose(&[0.0; 40], &[1, 4, 10], &lb, 1, &config).is_err());
        assert!(decode_pose(&[0.0; 8], &[2, 2, 2], &lb, 1, &config).is_err());
        assert!(decode_pose(&[], &[1, 56, 0], &lb, 1, &config).unwrap().is_empty());
    }
}
