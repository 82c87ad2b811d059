//! Windowed routing of per-frame segmentation statistics.

use std::collections::BTreeMap;

use crate::confusion::{ConfusionAccumulator, LabelMap, SegmentationSummary};
use crate::window::FrameWindow;
use crate::Result;

/// Routes each frame's statistics to a global accumulator plus every
/// window whose frame-index range contains the frame.
///
/// One aggregator is owned by exactly one evaluation round and discarded
/// (or reset) afterwards.
#[derive(Debug, Clone)]
pub struct WindowedAggregator {
    global: ConfusionAccumulator,
    windows: Vec<(FrameWindow, ConfusionAccumulator)>,
}

/// Per-window metric summaries for one round, keyed by window name.
#[derive(Debug, Clone)]
pub struct WindowedSummary {
    /// Summary over every processed frame.
    pub global: SegmentationSummary,
    /// One summary per configured window.
    pub windows: BTreeMap<&'static str, SegmentationSummary>,
}

impl WindowedSummary {
    /// Summary of a named window, if configured.
    pub fn window(&self, name: &str) -> Option<&SegmentationSummary> {
        self.windows.get(name)
    }

    /// mIoU of a named window, NaN when the window is not configured.
    pub fn window_miou(&self, name: &str) -> f64 {
        self.window(name).map_or(f64::NAN, |s| s.miou)
    }

    /// mIoU degradation between two windows, in percentage points.
    ///
    /// NaN windows propagate their undefined-ness through the subtraction.
    pub fn miou_drop(&self, from: &str, to: &str) -> f64 {
        self.window_miou(from) - self.window_miou(to)
    }
}

impl WindowedAggregator {
    /// Create an aggregator with one accumulator per window plus a global one.
    pub fn new(num_classes: usize, ignore_class: Option<u8>, windows: &[FrameWindow]) -> Self {
        Self {
            global: ConfusionAccumulator::new(num_classes, ignore_class),
            windows: windows
                .iter()
                .map(|w| (*w, ConfusionAccumulator::new(num_classes, ignore_class)))
                .collect(),
        }
    }

    /// Reset every accumulator for a new round of evaluation.
    pub fn reset(&mut self) {
        self.global.reset();
        for (_, acc) in &mut self.windows {
            acc.reset();
        }
    }

    /// Per-sequence hook, invoked before the first frame of each sequence.
    ///
    /// Stateless here; variant aggregators tracking per-sequence state rely
    /// on being called at the same point of the scan.
    pub fn begin_sequence(&mut self, _sequence_id: &str) {}

    /// Accumulate one frame pair into the global accumulator and every
    /// window containing `frame_index`.
    ///
    /// Windows are not assumed to be exclusive: a frame matching several
    /// windows updates all of them.
    pub fn process(
        &mut self,
        prediction: &LabelMap,
        target: &LabelMap,
        frame_index: u32,
    ) -> Result<()> {
        self.global.update(prediction, target)?;
        for (window, acc) in &mut self.windows {
            if window.contains(frame_index) {
                acc.update(prediction, target)?;
            }
        }
        Ok(())
    }

    /// Record a failed frame as a zero-effect sample, with the same window
    /// routing as [`process`](Self::process).
    pub fn process_failed(&mut self, frame_index: u32) {
        self.global.empty_update();
        for (window, acc) in &mut self.windows {
            if window.contains(frame_index) {
                acc.empty_update();
            }
        }
    }

    /// Derive the global summary plus one summary per window.
    pub fn summarize(&self) -> WindowedSummary {
        WindowedSummary {
            global: self.global.derive_metrics(),
            windows: self
                .windows
                .iter()
                .map(|(window, acc)| (window.name, acc.derive_metrics()))
                .collect(),
        }
    }

    /// The global accumulator.
    pub fn global(&self) -> &ConfusionAccumulator {
        &self.global
    }
}
