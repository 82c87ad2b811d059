//! Mean average precision over score-ranked box matches.

use std::collections::HashMap;

use crate::scalabel::{Box2d, DetFrame};

/// IoU thresholds of the COCO-style protocol: 0.50:0.05:0.95.
const IOU_THRESHOLDS: [f64; 10] = [0.5, 0.55, 0.6, 0.65, 0.7, 0.75, 0.8, 0.85, 0.9, 0.95];

/// Recall levels for the interpolated precision average.
const RECALL_LEVELS: usize = 101;

/// Scoring seam of the detection path.
///
/// The harness only consumes the summary mean AP; the matching protocol
/// behind it is swappable.
pub trait ApScorer {
    /// Mean AP (×100) of `predictions` against `targets` over `categories`.
    ///
    /// NaN when no category has ground-truth support.
    fn mean_ap(&self, targets: &[DetFrame], predictions: &[DetFrame], categories: &[String])
        -> f64;
}

/// COCO-protocol scorer: greedy score-ordered matching per category,
/// averaged over the IoU threshold sweep with 101-point interpolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanApScorer;

impl ApScorer for MeanApScorer {
    fn mean_ap(
        &self,
        targets: &[DetFrame],
        predictions: &[DetFrame],
        categories: &[String],
    ) -> f64 {
        let mut aps = Vec::with_capacity(categories.len());
        for category in categories {
            let ap = category_ap(targets, predictions, category);
            if !ap.is_nan() {
                aps.push(ap);
            }
        }
        if aps.is_empty() {
            f64::NAN
        } else {
            aps.iter().sum::<f64>() / aps.len() as f64 * 100.0
        }
    }
}

/// Intersection-over-union of two boxes.
pub fn box_iou(a: &Box2d, b: &Box2d) -> f64 {
    let inter_x1 = a.x1.max(b.x1);
    let inter_y1 = a.y1.max(b.y1);
    let inter_x2 = a.x2.min(b.x2);
    let inter_y2 = a.y2.min(b.y2);

    let inter_w = (inter_x2 - inter_x1).max(0.0);
    let inter_h = (inter_y2 - inter_y1).max(0.0);
    let inter_area = inter_w * inter_h;

    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union_area = area_a + area_b - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

/// AP of one category, averaged over the IoU threshold sweep.
///
/// NaN when the category has no ground-truth box.
fn category_ap(targets: &[DetFrame], predictions: &[DetFrame], category: &str) -> f64 {
    // Ground-truth boxes per frame key.
    let mut gt_boxes: HashMap<(&str, &str), Vec<Box2d>> = HashMap::new();
    let mut num_gt = 0usize;
    for frame in targets {
        for label in &frame.labels {
            if label.category != category {
                continue;
            }
            if let Some(box2d) = label.box2d {
                gt_boxes.entry(frame.key()).or_default().push(box2d);
                num_gt += 1;
            }
        }
    }
    if num_gt == 0 {
        return f64::NAN;
    }

    // Predictions ranked by confidence, highest first.
    let mut ranked: Vec<((&str, &str), f64, Box2d)> = Vec::new();
    for frame in predictions {
        for label in &frame.labels {
            if label.category != category {
                continue;
            }
            if let Some(box2d) = label.box2d {
                ranked.push((frame.key(), label.score.unwrap_or(1.0), box2d));
            }
        }
    }
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let sum: f64 = IOU_THRESHOLDS
        .iter()
        .map(|&threshold| ap_at_threshold(&gt_boxes, num_gt, &ranked, threshold))
        .sum();
    sum / IOU_THRESHOLDS.len() as f64
}

/// Interpolated AP at one IoU threshold.
fn ap_at_threshold<'a>(
    gt_boxes: &HashMap<(&'a str, &'a str), Vec<Box2d>>,
    num_gt: usize,
    ranked: &[((&'a str, &'a str), f64, Box2d)],
    threshold: f64,
) -> f64 {
    let mut matched: HashMap<(&str, &str), Vec<bool>> = gt_boxes
        .iter()
        .map(|(key, boxes)| (*key, vec![false; boxes.len()]))
        .collect();

    let mut true_positives = 0usize;
    let mut precision = Vec::with_capacity(ranked.len());
    let mut recall = Vec::with_capacity(ranked.len());

    for (rank, (key, _score, box2d)) in ranked.iter().enumerate() {
        let mut best_iou = 0.0;
        let mut best_index = None;
        if let Some(boxes) = gt_boxes.get(key) {
            let flags = &matched[key];
            for (index, gt) in boxes.iter().enumerate() {
                if flags[index] {
                    continue;
                }
                let iou = box_iou(box2d, gt);
                if iou > best_iou {
                    best_iou = iou;
                    best_index = Some(index);
                }
            }
        }

        if best_iou >= threshold {
            if let (Some(index), Some(flags)) = (best_index, matched.get_mut(key)) {
                flags[index] = true;
                true_positives += 1;
            }
        }
        precision.push(true_positives as f64 / (rank + 1) as f64);
        recall.push(true_positives as f64 / num_gt as f64);
    }

    interpolated_ap(&mut precision, &recall)
}

/// Area under the precision envelope sampled at 101 recall levels.
fn interpolated_ap(precision: &mut [f64], recall: &[f64]) -> f64 {
    let n = precision.len();
    if n == 0 {
        return 0.0;
    }
    for i in (0..n - 1).rev() {
        precision[i] = precision[i].max(precision[i + 1]);
    }

    let mut sum = 0.0;
    let mut index = 0;
    for level in 0..RECALL_LEVELS {
        let wanted = level as f64 / (RECALL_LEVELS - 1) as f64;
        while index < n && recall[index] < wanted {
            index += 1;
        }
        if index < n {
            sum += precision[index];
        }
    }
    sum / RECALL_LEVELS as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalabel::DetLabel;
    use approx::assert_relative_eq;

    fn frame(video: &str, name: &str, labels: Vec<DetLabel>) -> DetFrame {
        DetFrame {
            video_name: video.to_string(),
            name: name.to_string(),
            frame_index: None,
            labels,
        }
    }

    fn label(category: &str, score: Option<f64>, x1: f64, y1: f64, x2: f64, y2: f64) -> DetLabel {
        DetLabel {
            id: None,
            category: category.to_string(),
            score,
            box2d: Some(Box2d { x1, y1, x2, y2 }),
        }
    }

    #[test]
    fn test_box_iou_perfect_and_disjoint() {
        let a = Box2d { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 };
        let b = Box2d { x1: 20.0, y1: 20.0, x2: 30.0, y2: 30.0 };
        assert_relative_eq!(box_iou(&a, &a), 1.0, epsilon = 1e-10);
        assert_relative_eq!(box_iou(&a, &b), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_box_iou_partial() {
        let a = Box2d { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 };
        let b = Box2d { x1: 5.0, y1: 5.0, x2: 15.0, y2: 15.0 };
        // Intersection 25, union 175.
        assert_relative_eq!(box_iou(&a, &b), 25.0 / 175.0, epsilon = 1e-10);
    }

    #[test]
    fn test_perfect_predictions_score_100() {
        let targets = vec![
            frame("seq", "a.jpg", vec![label("car", None, 0.0, 0.0, 10.0, 10.0)]),
            frame("seq", "b.jpg", vec![label("car", None, 5.0, 5.0, 25.0, 25.0)]),
        ];
        let predictions = vec![
            frame("seq", "a.jpg", vec![label("car", Some(0.9), 0.0, 0.0, 10.0, 10.0)]),
            frame("seq", "b.jpg", vec![label("car", Some(0.8), 5.0, 5.0, 25.0, 25.0)]),
        ];
        let score = MeanApScorer.mean_ap(&targets, &predictions, &["car".to_string()]);
        assert_relative_eq!(score, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_disjoint_predictions_score_0() {
        let targets = vec![frame(
            "seq",
            "a.jpg",
            vec![label("car", None, 0.0, 0.0, 10.0, 10.0)],
        )];
        let predictions = vec![frame(
            "seq",
            "a.jpg",
            vec![label("car", Some(0.9), 50.0, 50.0, 60.0, 60.0)],
        )];
        let score = MeanApScorer.mean_ap(&targets, &predictions, &["car".to_string()]);
        assert_relative_eq!(score, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_no_ground_truth_is_nan() {
        let targets = vec![frame("seq", "a.jpg", vec![])];
        let predictions = vec![frame(
            "seq",
            "a.jpg",
            vec![label("car", Some(0.9), 0.0, 0.0, 10.0, 10.0)],
        )];
        let score = MeanApScorer.mean_ap(&targets, &predictions, &["car".to_string()]);
        assert!(score.is_nan());
    }

    #[test]
    fn test_missed_box_halves_recall() {
        // Two ground-truth boxes, one matched perfectly, none for the other.
        let targets = vec![frame(
            "seq",
            "a.jpg",
            vec![
                label("car", None, 0.0, 0.0, 10.0, 10.0),
                label("car", None, 100.0, 100.0, 120.0, 120.0),
            ],
        )];
        let predictions = vec![frame(
            "seq",
            "a.jpg",
            vec![label("car", Some(0.9), 0.0, 0.0, 10.0, 10.0)],
        )];
        let score = MeanApScorer.mean_ap(&targets, &predictions, &["car".to_string()]);
        // Precision 1.0 up to recall 0.5, zero beyond: 51 of 101 levels.
        assert_relative_eq!(score, 51.0 / 101.0 * 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_unmatched_frame_key_is_false_positive() {
        let targets = vec![frame(
            "seq",
            "a.jpg",
            vec![label("car", None, 0.0, 0.0, 10.0, 10.0)],
        )];
        let predictions = vec![frame(
            "other",
            "a.jpg",
            vec![label("car", Some(0.9), 0.0, 0.0, 10.0, 10.0)],
        )];
        let score = MeanApScorer.mean_ap(&targets, &predictions, &["car".to_string()]);
        assert_relative_eq!(score, 0.0, epsilon = 1e-10);
    }
}
