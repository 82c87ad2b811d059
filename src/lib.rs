//! # shift-tta-eval - SHIFT Continual Test-Time Adaptation Evaluation
//!
//! Evaluation harness for the SHIFT driving-scene continual test-time
//! adaptation challenge. Given a ground-truth annotation archive and a
//! participant submission archive, it computes task accuracy metrics and
//! adaptation-robustness metrics across a filtered set of video sequences.
//!
//! ## Features
//!
//! - Streaming confusion-matrix accumulation for semantic segmentation
//!   (mIoU / mAcc), partitioned by frame-index window
//! - Window-partitioned mean-AP scoring for 2D object detection
//! - Robustness scoring: accuracy drop between the source window and the
//!   shifted-target window, plus a loop-back recovery measure
//! - Per-frame failure isolation: a corrupt frame is logged and scored as
//!   an empty sample instead of aborting the round
//! - Nested-zip submission extraction and the challenge result envelope
//!
//! ## Example
//!
//! ```rust,ignore
//! use shift_tta_eval::{evaluate, EvalOptions, Phase};
//!
//! let options = EvalOptions::new("val_front_images_seq.csv", "test_front_images_seq.csv");
//! let output = evaluate(
//!     "annotations/SHIFT_challenge_TTA.zip".as_ref(),
//!     "testdata/submission.zip".as_ref(),
//!     Phase::Dev,
//!     &options,
//! )?;
//! println!("{output}");
//! ```

pub mod aggregator;
pub mod ap;
pub mod archive;
pub mod compose;
pub mod confusion;
pub mod detection;
pub mod harness;
pub mod scalabel;
pub mod scanner;
pub mod segmentation;
pub mod sequences;
pub mod window;

// Re-exports for convenience
pub use aggregator::{WindowedAggregator, WindowedSummary};
pub use ap::{ApScorer, MeanApScorer};
pub use compose::{compose_detection, compose_segmentation, ScoreMap};
pub use confusion::{ConfusionAccumulator, LabelMap, SegmentationSummary};
pub use detection::{DetectionEvaluator, DetectionReport};
pub use harness::{evaluate, EvalOptions, Phase, TaskEvaluator};
pub use scalabel::{AnnotationCache, Box2d, DetDataset, DetFrame, DetLabel};
pub use scanner::{ScanStats, SequenceScanner};
pub use segmentation::SegmentationEvaluator;
pub use sequences::{SequenceFilter, SequenceTable};
pub use window::{FrameWindow, CHALLENGE_WINDOWS};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use std::path::PathBuf;
    use thiserror::Error;

    /// Errors that can occur in the evaluation harness
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("not a zip archive: {}", .0.display())]
        NotAZipArchive(PathBuf),

        #[error("missing root directory: {}", .0.display())]
        MissingRoot(PathBuf),

        #[error("no recognized task artifact (det_2d.json or semseg/) in {}", .0.display())]
        NoTaskArtifact(PathBuf),

        #[error("unknown phase codename: {0}")]
        UnknownPhase(String),

        #[error("invalid label map shape: expected {expected}, got {got}")]
        InvalidLabelShape { expected: String, got: String },

        #[error("invalid label map: {0}")]
        InvalidLabelMap(String),

        #[error("metrics error: {0}")]
        MetricsError(String),

        #[error("sequence table error: {0}")]
        SequenceTableError(#[from] csv::Error),

        #[error("JSON error: {0}")]
        JsonError(#[from] serde_json::Error),

        #[error("archive error: {0}")]
        ZipError(#[from] zip::result::ZipError),

        #[error("image error: {0}")]
        ImageError(#[from] image::ImageError),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for harness operations
    pub type Result<T> = std::result::Result<T, Error>;
}
