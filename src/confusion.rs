//! Per-pixel confusion accumulation for semantic segmentation.

use nalgebra::DMatrix;

use crate::{Error, Result};

/// Dense H×W class-id map decoded from a single label image.
pub type LabelMap = DMatrix<u8>;

/// Metrics derived from one confusion matrix, as percentages.
///
/// Both values are NaN when the matrix has no support; callers treat NaN
/// as "no contribution", never as an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationSummary {
    /// Mean intersection-over-union across classes with nonzero IoU.
    pub miou: f64,
    /// Overall pixel accuracy (trace over total count).
    pub macc: f64,
}

/// Accumulates a class-by-class confusion matrix over streamed frames.
///
/// The matrix is indexed `[true_class][predicted_class]` and its cells are
/// monotonically non-decreasing across `update` calls within one round.
#[derive(Debug, Clone)]
pub struct ConfusionAccumulator {
    num_classes: usize,
    ignore_class: Option<u8>,
    matrix: DMatrix<f64>,
}

impl ConfusionAccumulator {
    /// Create an accumulator for `num_classes` classes.
    ///
    /// Pixels whose target equals `ignore_class` are excluded from counting.
    pub fn new(num_classes: usize, ignore_class: Option<u8>) -> Self {
        Self {
            num_classes,
            ignore_class,
            matrix: DMatrix::zeros(num_classes, num_classes),
        }
    }

    /// Reset the matrix to all-zero for a new round of evaluation.
    pub fn reset(&mut self) {
        self.matrix.fill(0.0);
    }

    /// Accumulate one prediction/target pair of identical shape.
    ///
    /// Pixels whose target is outside `[0, num_classes)` or equals the
    /// ignore class are skipped. The frame is counted atomically: on any
    /// error the matrix is left untouched.
    pub fn update(&mut self, prediction: &LabelMap, target: &LabelMap) -> Result<()> {
        let frame_matrix = self.calc_confusion(prediction, target)?;
        self.matrix += frame_matrix;
        Ok(())
    }

    /// Record a zero-effect sample for a frame that failed to decode.
    pub fn empty_update(&mut self) {
        self.matrix += DMatrix::<f64>::zeros(self.num_classes, self.num_classes);
    }

    /// Confusion matrix of a single frame pair.
    fn calc_confusion(&self, prediction: &LabelMap, target: &LabelMap) -> Result<DMatrix<f64>> {
        if prediction.shape() != target.shape() {
            return Err(Error::InvalidLabelShape {
                expected: format!("{:?}", target.shape()),
                got: format!("{:?}", prediction.shape()),
            });
        }

        let mut frame_matrix = DMatrix::zeros(self.num_classes, self.num_classes);
        for (predicted, true_class) in prediction.iter().zip(target.iter()) {
            if (*true_class as usize) >= self.num_classes {
                continue;
            }
            if Some(*true_class) == self.ignore_class {
                continue;
            }
            let predicted = *predicted as usize;
            if predicted >= self.num_classes {
                return Err(Error::InvalidLabelMap(format!(
                    "predicted class {} out of range for {} classes",
                    predicted, self.num_classes
                )));
            }
            frame_matrix[(*true_class as usize, predicted)] += 1.0;
        }
        Ok(frame_matrix)
    }

    /// Derive mIoU and mAcc from the accumulated matrix.
    ///
    /// Per class `c`, `IoU_c = m[c][c] / (row_c + col_c - m[c][c])`; classes
    /// with zero or undefined IoU are excluded from the mean. An all-zero
    /// matrix yields NaN for both metrics.
    pub fn derive_metrics(&self) -> SegmentationSummary {
        let c = self.num_classes;
        let mut ious = Vec::with_capacity(c);
        for i in 0..c {
            let tp = self.matrix[(i, i)];
            let mut row_sum = 0.0;
            let mut col_sum = 0.0;
            for j in 0..c {
                row_sum += self.matrix[(i, j)];
                col_sum += self.matrix[(j, i)];
            }
            let iou = tp / (row_sum + col_sum - tp);
            if iou > 0.0 {
                ious.push(iou);
            }
        }

        let miou = if ious.is_empty() {
            f64::NAN
        } else {
            ious.iter().sum::<f64>() / ious.len() as f64 * 100.0
        };
        let macc = self.matrix.trace() / self.matrix.sum() * 100.0;

        SegmentationSummary { miou, macc }
    }

    /// The accumulated confusion matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Number of semantic classes.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
