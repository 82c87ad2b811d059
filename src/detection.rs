//! Window and sequence partitioning for the object-detection task.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::ap::{ApScorer, MeanApScorer};
use crate::compose::{compose_detection, ScoreMap};
use crate::harness::TaskEvaluator;
use crate::scalabel::{AnnotationCache, DetDataset};
use crate::sequences::SequenceFilter;
use crate::window::{FrameWindow, LOOP_BACK_WINDOW, SOURCE_WINDOW, TARGET_WINDOW};
use crate::{Error, Result};

/// Relative path of the detection annotation document on both sides.
pub const DET_ARTIFACT: &str = "det_2d.json";

impl DetDataset {
    /// Copy retaining only frames whose sequence id is allowed.
    pub fn retain_sequences(&self, allowed: &SequenceFilter) -> DetDataset {
        DetDataset {
            frames: self
                .frames
                .iter()
                .filter(|frame| allowed.contains(&frame.video_name))
                .cloned()
                .collect(),
            config: self.config.clone(),
        }
    }

    /// Copy retaining only frames whose `(sequence, frame-name)` key also
    /// exists in `target`. Submission extras are dropped so only frames
    /// the ground truth provides are scored.
    pub fn retain_target_frames(&self, target: &DetDataset) -> DetDataset {
        let provided: HashSet<(&str, &str)> = target.frames.iter().map(|f| f.key()).collect();
        DetDataset {
            frames: self
                .frames
                .iter()
                .filter(|frame| provided.contains(&frame.key()))
                .cloned()
                .collect(),
            config: self.config.clone(),
        }
    }

    /// Copy retaining only frames whose index lies in `window`, inclusive
    /// on both ends. Frames without an index are dropped.
    pub fn retain_window(&self, window: &FrameWindow) -> DetDataset {
        DetDataset {
            frames: self
                .frames
                .iter()
                .filter(|frame| frame.frame_index.is_some_and(|i| window.contains(i)))
                .cloned()
                .collect(),
            config: self.config.clone(),
        }
    }
}

/// Mean AP per evaluation window, as percentages. NaN for windows without
/// ground-truth support.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionReport {
    pub map: f64,
    pub map_source: f64,
    pub map_target: f64,
    pub map_loop_back: f64,
}

/// Detection task evaluator: partitions the annotation documents by
/// sequence and window and delegates scoring to an [`ApScorer`].
pub struct DetectionEvaluator<S = MeanApScorer> {
    scorer: S,
    cache: AnnotationCache,
    report: Option<DetectionReport>,
}

impl DetectionEvaluator<MeanApScorer> {
    pub fn new() -> Self {
        Self::with_scorer(MeanApScorer)
    }

    /// Whether a submission directory carries the detection artifact.
    pub fn artifact_present(submission_root: &Path) -> bool {
        submission_root.join(DET_ARTIFACT).is_file()
    }
}

impl Default for DetectionEvaluator<MeanApScorer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ApScorer> DetectionEvaluator<S> {
    /// Evaluate with a custom scoring protocol.
    pub fn with_scorer(scorer: S) -> Self {
        Self {
            scorer,
            cache: AnnotationCache::new(),
            report: None,
        }
    }

    /// The per-window report of the last processed round.
    pub fn report(&self) -> Option<&DetectionReport> {
        self.report.as_ref()
    }

    fn window_ap(
        &self,
        target: &DetDataset,
        prediction: &DetDataset,
        categories: &[String],
        window: &FrameWindow,
    ) -> f64 {
        let target = target.retain_window(window);
        let prediction = prediction.retain_window(window);
        debug!(
            window = window.name,
            target_frames = target.frames.len(),
            prediction_frames = prediction.frames.len(),
            "scoring window"
        );
        self.scorer
            .mean_ap(&target.frames, &prediction.frames, categories)
    }
}

impl<S: ApScorer> TaskEvaluator for DetectionEvaluator<S> {
    fn reset(&mut self) {
        self.report = None;
    }

    fn process_from_source(
        &mut self,
        submission_root: &Path,
        annotation_root: &Path,
        sequences: &SequenceFilter,
    ) -> Result<()> {
        let target_path = annotation_root.join(DET_ARTIFACT);
        if !target_path.is_file() {
            return Err(Error::MissingRoot(target_path));
        }

        let target = self.cache.load(&target_path)?.retain_sequences(sequences);
        let prediction = self
            .cache
            .load(&submission_root.join(DET_ARTIFACT))?
            .retain_sequences(sequences)
            .retain_target_frames(&target);
        let categories = target.category_names();
        info!(
            sequences = sequences.len(),
            target_frames = target.frames.len(),
            prediction_frames = prediction.frames.len(),
            categories = categories.len(),
            "evaluating object detection"
        );

        self.report = Some(DetectionReport {
            map: self
                .scorer
                .mean_ap(&target.frames, &prediction.frames, &categories),
            map_source: self.window_ap(&target, &prediction, &categories, &SOURCE_WINDOW),
            map_target: self.window_ap(&target, &prediction, &categories, &TARGET_WINDOW),
            map_loop_back: self.window_ap(&target, &prediction, &categories, &LOOP_BACK_WINDOW),
        });
        Ok(())
    }

    fn summarize(&self) -> Result<ScoreMap> {
        let report = self
            .report
            .ok_or_else(|| Error::MetricsError("no evaluation round processed".to_string()))?;
        Ok(compose_detection(&report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalabel::{Box2d, DetFrame, DetLabel};
    use crate::window::SOURCE_WINDOW;

    fn frame(video: &str, name: &str, index: Option<u32>) -> DetFrame {
        DetFrame {
            video_name: video.to_string(),
            name: name.to_string(),
            frame_index: index,
            labels: vec![DetLabel {
                id: None,
                category: "car".to_string(),
                score: Some(0.9),
                box2d: Some(Box2d { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 }),
            }],
        }
    }

    fn dataset(frames: Vec<DetFrame>) -> DetDataset {
        DetDataset { frames, config: None }
    }

    #[test]
    fn test_window_filter_retains_contained_indices() {
        let ds = dataset(vec![
            frame("seqX", "a.jpg", Some(0)),
            frame("seqX", "b.jpg", Some(10)),
            frame("seqX", "c.jpg", Some(200)),
        ]);
        let filtered = ds.retain_window(&SOURCE_WINDOW);
        let names: Vec<_> = filtered.frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_window_filter_drops_unindexed_frames() {
        let ds = dataset(vec![
            frame("seqX", "a.jpg", Some(20)),
            frame("seqX", "b.jpg", None),
        ]);
        let filtered = ds.retain_window(&SOURCE_WINDOW);
        assert_eq!(filtered.frames.len(), 1);
    }

    #[test]
    fn test_sequence_filter_restricts_videos() {
        let ds = dataset(vec![
            frame("seqX", "a.jpg", Some(0)),
            frame("seqY", "a.jpg", Some(0)),
        ]);
        let allowed = SequenceFilter::new(vec!["seqX".to_string()]);
        let filtered = ds.retain_sequences(&allowed);
        assert_eq!(filtered.frames.len(), 1);
        assert_eq!(filtered.frames[0].video_name, "seqX");
    }

    #[test]
    fn test_target_frame_filter_drops_extras() {
        let target = dataset(vec![frame("seqX", "a.jpg", Some(0))]);
        let prediction = dataset(vec![
            frame("seqX", "a.jpg", Some(0)),
            frame("seqX", "extra.jpg", Some(1)),
            frame("seqZ", "a.jpg", Some(0)),
        ]);
        let filtered = prediction.retain_target_frames(&target);
        assert_eq!(filtered.frames.len(), 1);
        assert_eq!(filtered.frames[0].name, "a.jpg");
        assert_eq!(filtered.frames[0].video_name, "seqX");
    }

    #[test]
    fn test_filters_do_not_mutate_source() {
        let ds = dataset(vec![frame("seqX", "a.jpg", Some(0))]);
        let _ = ds.retain_window(&SOURCE_WINDOW);
        assert_eq!(ds.frames.len(), 1);
    }
}
