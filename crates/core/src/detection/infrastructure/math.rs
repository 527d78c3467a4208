//! Shared math utilities for the ONNX detection backends.
//!
//! Box overlap, greedy non-maximum suppression, logistic activation and
//! SSD anchor generation as used by the BlazeFace-family models.

use std::f32::consts::PI;

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// A scored candidate that can take part in NMS.
pub trait Scored {
    fn score(&self) -> f32;
    fn corners(&self) -> [f32; 4];
}

/// Greedy NMS: sort by score descending, suppress boxes overlapping a
/// kept box by more than `iou_thresh`.
pub fn nms<T: Scored + Clone>(candidates: &mut [T], iou_thresh: f32) -> Vec<T> {
    candidates.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(candidates[i].clone());
        let kept = candidates[i].corners();
        for j in (i + 1)..candidates.len() {
            if !suppressed[j] && bbox_iou(&kept, &candidates[j].corners()) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

/// Logistic function with the input clipped to ±100, matching the
/// score clipping the models were calibrated with.
pub fn sigmoid(x: f32) -> f32 {
    let x = x.clamp(-100.0, 100.0);
    1.0 / (1.0 + (-x).exp())
}

/// Wraps an angle into `[-π, π)`.
pub fn normalize_radians(angle: f32) -> f32 {
    angle - 2.0 * PI * ((angle + PI) / (2.0 * PI)).floor()
}

/// SSD anchor layout for a square model input.
///
/// Consecutive layers sharing a stride share one feature map; each layer
/// contributes one anchor per cell, two when `interpolated_scale` is set.
pub struct AnchorSpec<'a> {
    pub input_size: u32,
    pub strides: &'a [u32],
    pub interpolated_scale: bool,
}

/// Generates normalized anchor centers `[cx, cy]` in model input space.
pub fn generate_anchors(spec: &AnchorSpec<'_>) -> Vec<[f32; 2]> {
    let per_layer = if spec.interpolated_scale { 2 } else { 1 };
    let mut anchors = Vec::new();
    let mut layer = 0;

    while layer < spec.strides.len() {
        let stride = spec.strides[layer];
        let mut repeats = 0;
        let mut last = layer;
        while last < spec.strides.len() && spec.strides[last] == stride {
            repeats += per_layer;
            last += 1;
        }

        let grid = (spec.input_size as f32 / stride as f32).ceil() as usize;
        for y in 0..grid {
            for x in 0..grid {
                let cx = (x as f32 + 0.5) / grid as f32;
                let cy = (y as f32 + 0.5) / grid as f32;
                for _ in 0..repeats {
                    anchors.push([cx, cy]);
                }
            }
        }
        layer = last;
    }

    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[derive(Clone, Debug)]
    struct Candidate {
        corners: [f32; 4],
        score: f32,
    }

    impl Scored for Candidate {
        fn score(&self) -> f32 {
            self.score
        }
        fn corners(&self) -> [f32; 4] {
            self.corners
        }
    }

    #[test]
    fn test_bbox_iou_no_overlap() {
        assert_eq!(bbox_iou(&[0.0, 0.0, 10.0, 10.0], &[20.0, 20.0, 30.0, 30.0]), 0.0);
    }

    #[test]
    fn test_bbox_iou_perfect_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_relative_eq!(bbox_iou(&a, &a), 1.0);
    }

    #[test]
    fn test_bbox_iou_partial_overlap() {
        // intersection 50, union 150
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 0.0, 15.0, 10.0];
        assert_relative_eq!(bbox_iou(&a, &b), 50.0 / 150.0);
    }

    #[test]
    fn test_nms_suppresses_overlap_and_keeps_best() {
        let mut dets = vec![
            Candidate {
                corners: [5.0, 5.0, 105.0, 105.0],
                score: 0.7,
            },
            Candidate {
                corners: [0.0, 0.0, 100.0, 100.0],
                score: 0.9,
            },
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn test_nms_keeps_separate() {
        let mut dets = vec![
            Candidate {
                corners: [0.0, 0.0, 50.0, 50.0],
                score: 0.9,
            },
            Candidate {
                corners: [200.0, 200.0, 250.0, 250.0],
                score: 0.8,
            },
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_sigmoid() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert!((sigmoid(10.0) - 1.0).abs() < 0.001);
        assert!(sigmoid(-10.0) < 0.001);
        assert!(sigmoid(-1000.0) >= 0.0);
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(3.0 * PI / 2.0, -PI / 2.0)]
    #[case(-3.0 * PI / 2.0, PI / 2.0)]
    fn test_normalize_radians(#[case] input: f32, #[case] expected: f32) {
        assert_relative_eq!(normalize_radians(input), expected, epsilon = 1e-5);
    }

    #[rstest]
    #[case::face_short_range(128, &[8, 16, 16, 16], true, 896)]
    #[case::face_full_range(192, &[4], false, 2304)]
    #[case::palm(192, &[8, 16, 16, 16], true, 2016)]
    fn test_anchor_counts(
        #[case] input_size: u32,
        #[case] strides: &[u32],
        #[case] interpolated_scale: bool,
        #[case] expected: usize,
    ) {
        let anchors = generate_anchors(&AnchorSpec {
            input_size,
            strides,
            interpolated_scale,
        });
        assert_eq!(anchors.len(), expected);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        let anchors = generate_anchors(&AnchorSpec {
            input_size: 128,
            strides: &[8, 16, 16, 16],
            interpolated_scale: true,
        });
        for a in &anchors {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
        // First cell of the 16x16 map, repeated for both anchors.
        assert_relative_eq!(anchors[0][0], 0.5 / 16.0);
        assert_eq!(anchors[0], anchors[1]);
    }
}
