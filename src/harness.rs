//! Harness entry point: archive extraction, task dispatch and the result
//! envelope.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::info;

use crate::archive;
use crate::compose::ScoreMap;
use crate::detection::DetectionEvaluator;
use crate::segmentation::SegmentationEvaluator;
use crate::sequences::{SequenceFilter, SequenceTable};
use crate::{Error, Result};

/// Challenge phase a submission is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Development phase, scored on the validation split.
    Dev,
    /// Final phase, scored on the held-out test split.
    Test,
}

impl Phase {
    /// Parse the phase codename used by the submission runner.
    pub fn from_codename(name: &str) -> Result<Self> {
        match name {
            "dev" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            other => Err(Error::UnknownPhase(other.to_string())),
        }
    }

    pub fn codename(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Test => "test",
        }
    }

    /// Key of the split entry in the result envelope.
    pub fn split_key(&self) -> &'static str {
        match self {
            Self::Dev => "val_split",
            Self::Test => "test_split",
        }
    }
}

/// Harness configuration: the fixed external sequence tables plus optional
/// narrowing of the evaluated set.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Sequence table of the validation split.
    pub val_table: PathBuf,
    /// Sequence table of the test split.
    pub test_table: PathBuf,
    /// Restrict evaluation to sequences of one shift type.
    pub shift_type: Option<String>,
    /// Evaluate at most this many sequences.
    pub max_sequences: Option<usize>,
}

impl EvalOptions {
    pub fn new<P: Into<PathBuf>>(val_table: P, test_table: P) -> Self {
        Self {
            val_table: val_table.into(),
            test_table: test_table.into(),
            shift_type: None,
            max_sequences: None,
        }
    }

    fn table_path(&self, phase: Phase) -> &Path {
        match phase {
            Phase::Dev => &self.val_table,
            Phase::Test => &self.test_table,
        }
    }
}

/// Capability set shared by the per-task evaluators.
pub trait TaskEvaluator {
    /// Clear all per-round state.
    fn reset(&mut self);

    /// Run one evaluation round over the extracted directory pair.
    fn process_from_source(
        &mut self,
        submission_root: &Path,
        annotation_root: &Path,
        sequences: &SequenceFilter,
    ) -> Result<()>;

    /// Composed score set of the processed round.
    fn summarize(&self) -> Result<ScoreMap>;
}

/// Evaluate a submission archive against a ground-truth archive.
///
/// Both paths must end in `.zip`; this is checked before any extraction is
/// attempted. The task is selected from the artifacts the submission
/// carries (`det_2d.json` for detection, `semseg/` for segmentation).
///
/// Returns the result envelope
/// `{"result": [{"<split>": scores}], "submission_result": scores}`, where
/// undefined metrics serialize as `null`.
pub fn evaluate(
    annotation_archive: &Path,
    submission_archive: &Path,
    phase: Phase,
    options: &EvalOptions,
) -> Result<Value> {
    archive::require_zip(annotation_archive)?;
    archive::require_zip(submission_archive)?;

    info!(phase = phase.codename(), "starting evaluation");
    let annotation_root = archive::extract_nested(annotation_archive)?;
    let submission_root = archive::extract_nested(submission_archive)?;

    let table = SequenceTable::from_path(options.table_path(phase))?;
    let mut sequences = table.used_sequences(options.shift_type.as_deref());
    if let Some(max) = options.max_sequences {
        sequences.truncate(max);
    }
    info!(eligible = sequences.len(), "loaded sequence table");

    let mut evaluator = select_task(&submission_root, options)?;
    evaluator.reset();
    evaluator.process_from_source(&submission_root, &annotation_root, &sequences)?;
    let scores = evaluator.summarize()?;
    info!(?scores, "evaluation finished");

    Ok(json!({
        "result": [{ phase.split_key(): scores }],
        "submission_result": scores,
    }))
}

/// Pick the task evaluator matching the submission's artifacts.
///
/// Detection is checked first; a submission carrying both artifacts is
/// scored as a detection submission.
fn select_task(
    submission_root: &Path,
    options: &EvalOptions,
) -> Result<Box<dyn TaskEvaluator>> {
    if submission_root.join(crate::detection::DET_ARTIFACT).is_file() {
        Ok(Box::new(DetectionEvaluator::new()))
    } else if SegmentationEvaluator::artifact_present(submission_root) {
        Ok(Box::new(SegmentationEvaluator::with_max_sequences(
            options.max_sequences,
        )))
    } else {
        Err(Error::NoTaskArtifact(submission_root.to_path_buf()))
    }
}
