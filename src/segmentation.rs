//! Segmentation task evaluator.

use std::path::Path;

use tracing::info;

use crate::aggregator::WindowedAggregator;
use crate::compose::{compose_segmentation, ScoreMap};
use crate::harness::TaskEvaluator;
use crate::scanner::SequenceScanner;
use crate::sequences::SequenceFilter;
use crate::window::CHALLENGE_WINDOWS;
use crate::Result;

/// Relative path of the segmentation label trees on both sides.
pub const SEMSEG_ARTIFACT: &str = "semseg";

/// Number of semantic classes in the label set.
pub const NUM_CLASSES: usize = 23;

/// Class id excluded from scoring (unlabeled).
pub const IGNORE_CLASS: u8 = 0;

/// Segmentation task evaluator: scans the label-map folder pair and
/// aggregates per-window confusion statistics.
#[derive(Debug, Clone)]
pub struct SegmentationEvaluator {
    scanner: SequenceScanner,
    aggregator: WindowedAggregator,
}

impl SegmentationEvaluator {
    pub fn new() -> Self {
        Self::with_max_sequences(None)
    }

    /// Evaluate at most `max` sequences.
    pub fn with_max_sequences(max: Option<usize>) -> Self {
        Self {
            scanner: SequenceScanner::with_max_sequences(max),
            aggregator: WindowedAggregator::new(
                NUM_CLASSES,
                Some(IGNORE_CLASS),
                &CHALLENGE_WINDOWS,
            ),
        }
    }

    /// Whether a submission directory carries the segmentation artifact.
    pub fn artifact_present(submission_root: &Path) -> bool {
        submission_root.join(SEMSEG_ARTIFACT).is_dir()
    }

    /// The aggregator of the current round.
    pub fn aggregator(&self) -> &WindowedAggregator {
        &self.aggregator
    }
}

impl Default for SegmentationEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskEvaluator for SegmentationEvaluator {
    fn reset(&mut self) {
        self.aggregator.reset();
    }

    fn process_from_source(
        &mut self,
        submission_root: &Path,
        annotation_root: &Path,
        sequences: &SequenceFilter,
    ) -> Result<()> {
        info!("evaluating semantic segmentation");
        let stats = self.scanner.scan(
            &submission_root.join(SEMSEG_ARTIFACT),
            &annotation_root.join(SEMSEG_ARTIFACT),
            Some(sequences),
            &mut self.aggregator,
        )?;
        info!(
            sequences = stats.sequences,
            frames = stats.frames,
            failed_frames = stats.failed_frames,
            "segmentation scan finished"
        );
        Ok(())
    }

    fn summarize(&self) -> Result<ScoreMap> {
        Ok(compose_segmentation(&self.aggregator.summarize()))
    }
}
