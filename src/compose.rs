//! Final challenge score assembly.
//!
//! Combines per-window metric summaries into the reported score set. The
//! `2×` drop penalty is a fixed constant of the challenge scoring rule.

use std::collections::BTreeMap;

use crate::aggregator::WindowedSummary;
use crate::detection::DetectionReport;

/// Ordered metric-name to value mapping, serialized into the result
/// envelope. Undefined metrics stay NaN and serialize as `null`.
pub type ScoreMap = BTreeMap<String, f64>;

/// Weight of the source-to-target accuracy drop in the overall score.
const DROP_PENALTY: f64 = 2.0;

/// Compose the segmentation score set from a windowed summary.
///
/// The loop-back window is summarized upstream but does not enter the
/// composed score, matching the challenge rules.
pub fn compose_segmentation(summary: &WindowedSummary) -> ScoreMap {
    let miou = summary.global.miou;
    let miou_source = summary.window_miou("source");
    let miou_target = summary.window_miou("target");
    let miou_drop = summary.miou_drop("source", "target");

    let mut scores = ScoreMap::new();
    scores.insert("mIoU".to_string(), miou);
    scores.insert("mIoU_source".to_string(), miou_source);
    scores.insert("mIoU_target".to_string(), miou_target);
    scores.insert("mIoU_drop".to_string(), miou_drop);
    scores.insert("overall".to_string(), miou - DROP_PENALTY * miou_drop);
    scores
}

/// Compose the detection score set from per-window mean-AP values.
///
/// `mAP_loop_back` is reported but, like the segmentation path, does not
/// enter the overall score.
pub fn compose_detection(report: &DetectionReport) -> ScoreMap {
    let map_drop = report.map_source - report.map_target;

    let mut scores = ScoreMap::new();
    scores.insert("mAP".to_string(), report.map);
    scores.insert("mAP_source".to_string(), report.map_source);
    scores.insert("mAP_target".to_string(), report.map_target);
    scores.insert("mAP_loop_back".to_string(), report.map_loop_back);
    scores.insert("mAP_drop".to_string(), map_drop);
    scores.insert("overall".to_string(), report.map - DROP_PENALTY * map_drop);
    scores
}
