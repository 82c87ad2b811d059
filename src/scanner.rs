//! Folder-pair scanning for the segmentation task.
//!
//! Walks a target/prediction directory pair sequence-by-sequence and
//! frame-by-frame in sorted order, feeding decoded label maps to a
//! [`WindowedAggregator`]. A single bad frame never aborts a scan: the
//! failure is logged and recorded as a zero-effect sample.

use std::fs;
use std::path::Path;

use image::DynamicImage;
use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::aggregator::WindowedAggregator;
use crate::confusion::LabelMap;
use crate::sequences::SequenceFilter;
use crate::{Error, Result};

/// Statistics of one scan over a folder pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Sequences that were evaluated.
    pub sequences: usize,
    /// Frames attempted, including failed ones.
    pub frames: usize,
    /// Frames recorded as empty samples after a decode or shape failure.
    pub failed_frames: usize,
}

/// Iterates sequence folders under a target root, decoding frame pairs.
#[derive(Debug, Clone, Default)]
pub struct SequenceScanner {
    max_sequences: Option<usize>,
}

impl SequenceScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Truncate the sorted sequence listing to the first `max` entries.
    pub fn with_max_sequences(max: Option<usize>) -> Self {
        Self { max_sequences: max }
    }

    /// Scan every eligible sequence under `target_root`, mirroring paths
    /// into `prediction_root`, and feed each frame pair to `aggregator`.
    ///
    /// Sequence directories and frame files are visited in lexicographic
    /// order. A missing `target_root` is fatal; any per-frame failure is
    /// logged, routed to [`WindowedAggregator::process_failed`] and the
    /// scan continues.
    pub fn scan(
        &self,
        prediction_root: &Path,
        target_root: &Path,
        filter: Option<&SequenceFilter>,
        aggregator: &mut WindowedAggregator,
    ) -> Result<ScanStats> {
        if !target_root.is_dir() {
            return Err(Error::MissingRoot(target_root.to_path_buf()));
        }

        let mut sequence_ids = list_sorted(target_root, |path| path.is_dir())?;
        if let Some(max) = self.max_sequences {
            sequence_ids.truncate(max);
        }

        let mut stats = ScanStats::default();
        for sequence_id in &sequence_ids {
            if let Some(filter) = filter {
                if !filter.contains(sequence_id) {
                    continue;
                }
            }
            aggregator.begin_sequence(sequence_id);
            stats.sequences += 1;

            let target_dir = target_root.join(sequence_id);
            let prediction_dir = prediction_root.join(sequence_id);
            let frame_names = list_sorted(&target_dir, |path| {
                path.extension().and_then(|e| e.to_str()) == Some("png")
            })?;
            debug!(sequence = %sequence_id, frames = frame_names.len(), "scanning sequence");

            for frame_name in &frame_names {
                let Some(frame_index) = parse_frame_index(frame_name) else {
                    warn!(
                        "skipping {}/{}: no leading frame index",
                        sequence_id, frame_name
                    );
                    continue;
                };
                stats.frames += 1;

                let result = decode_pair(
                    &prediction_dir.join(frame_name),
                    &target_dir.join(frame_name),
                )
                .and_then(|(prediction, target)| {
                    aggregator.process(&prediction, &target, frame_index)
                });
                if let Err(err) = result {
                    warn!(
                        "error when evaluating {}/{}: {}",
                        sequence_id, frame_name, err
                    );
                    aggregator.process_failed(frame_index);
                    stats.failed_frames += 1;
                }
            }
        }
        Ok(stats)
    }
}

/// Decode a label PNG into an H×W class-id map.
///
/// Multi-channel images carry the class id in channel 0; the remaining
/// channels are ignored. 8-bit grayscale images are taken as-is.
pub fn load_label_map(path: &Path) -> Result<LabelMap> {
    let image = image::open(path)?;
    let (height, width) = (image.height() as usize, image.width() as usize);
    let data: Vec<u8> = match image {
        DynamicImage::ImageLuma8(buffer) => buffer.into_raw(),
        other => other.to_rgb8().pixels().map(|p| p.0[0]).collect(),
    };
    Ok(DMatrix::from_row_iterator(height, width, data))
}

fn decode_pair(prediction_path: &Path, target_path: &Path) -> Result<(LabelMap, LabelMap)> {
    let prediction = load_label_map(prediction_path)?;
    let target = load_label_map(target_path)?;
    Ok((prediction, target))
}

/// Leading integer token of a frame filename, split on `_`.
fn parse_frame_index(frame_name: &str) -> Option<u32> {
    frame_name.split('_').next()?.parse().ok()
}

/// Sorted names of the entries under `dir` accepted by `keep`.
fn list_sorted(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !keep(&entry.path()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
