//! Per-phase sequence tables and the eligibility filter.
//!
//! Each challenge phase ships a CSV table mapping sequence id to shift
//! type, starting weather and starting time-of-day. Only sequences that
//! start in clear daytime conditions are eligible for evaluation.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::Result;

/// Shift types present in the challenge sequence tables.
pub const SHIFT_TYPES: [&str; 3] = ["clear_to_rainy", "clear_to_foggy", "daytime_to_night"];

const ELIGIBLE_WEATHER: &str = "clear";
const ELIGIBLE_TIMEOFDAY: &str = "daytime";

/// One row of a sequence table.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceRecord {
    /// Sequence id.
    pub video: String,
    /// Kind of simulated domain shift the sequence runs through.
    pub shift_type: String,
    /// Coarse weather label at the first frame.
    pub start_weather_coarse: String,
    /// Coarse time-of-day label at the first frame.
    pub start_timeofday_coarse: String,
}

/// The sequence metadata table of one challenge phase.
#[derive(Debug, Clone, Default)]
pub struct SequenceTable {
    records: Vec<SequenceRecord>,
}

impl SequenceTable {
    /// Load a table from a CSV file with a header row.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        Self::collect(&mut reader)
    }

    /// Load a table from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        Self::collect(&mut reader)
    }

    fn collect<R: Read>(reader: &mut csv::Reader<R>) -> Result<Self> {
        let mut records = Vec::new();
        for record in reader.deserialize() {
            records.push(record?);
        }
        Ok(Self { records })
    }

    /// All rows, in table order.
    pub fn records(&self) -> &[SequenceRecord] {
        &self.records
    }

    /// Sequences eligible for evaluation: starting weather `clear` and
    /// starting time-of-day `daytime`, optionally narrowed to one shift
    /// type. Table order is preserved.
    pub fn used_sequences(&self, shift_type: Option<&str>) -> SequenceFilter {
        let names = self
            .records
            .iter()
            .filter(|r| {
                r.start_weather_coarse == ELIGIBLE_WEATHER
                    && r.start_timeofday_coarse == ELIGIBLE_TIMEOFDAY
            })
            .filter(|r| shift_type.is_none_or(|s| r.shift_type == s))
            .map(|r| r.video.clone())
            .collect();
        SequenceFilter::new(names)
    }
}

/// Ordered set of sequence ids eligible in one evaluation round.
///
/// Read-only during a round; `truncate` is applied once up front when the
/// caller caps the number of evaluated sequences.
#[derive(Debug, Clone, Default)]
pub struct SequenceFilter {
    names: Vec<String>,
    index: HashSet<String>,
}

impl SequenceFilter {
    /// Build a filter from sequence ids, keeping first occurrences in order.
    pub fn new(names: Vec<String>) -> Self {
        let mut filter = Self::default();
        for name in names {
            if filter.index.insert(name.clone()) {
                filter.names.push(name);
            }
        }
        filter
    }

    /// Whether `sequence_id` is eligible.
    pub fn contains(&self, sequence_id: &str) -> bool {
        self.index.contains(sequence_id)
    }

    /// Keep only the first `max` sequences.
    pub fn truncate(&mut self, max: usize) {
        if max < self.names.len() {
            self.names.truncate(max);
            self.index = self.names.iter().cloned().collect();
        }
    }

    /// Eligible sequence ids, in table order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
video,shift_type,start_weather_coarse,start_timeofday_coarse
seq-0a1b,clear_to_foggy,clear,daytime
seq-1c2d,clear_to_rainy,clear,daytime
seq-2e3f,daytime_to_night,overcast,daytime
seq-3a4b,daytime_to_night,clear,night
seq-4c5d,daytime_to_night,clear,daytime
";

    fn table() -> SequenceTable {
        SequenceTable::from_reader(TABLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_eligibility_requires_clear_daytime() {
        let used = table().used_sequences(None);
        assert_eq!(used.names(), ["seq-0a1b", "seq-1c2d", "seq-4c5d"]);
        assert!(!used.contains("seq-2e3f"));
        assert!(!used.contains("seq-3a4b"));
    }

    #[test]
    fn test_shift_type_narrowing() {
        let used = table().used_sequences(Some("clear_to_rainy"));
        assert_eq!(used.names(), ["seq-1c2d"]);
    }

    #[test]
    fn test_truncate_keeps_table_order() {
        let mut used = table().used_sequences(None);
        used.truncate(2);
        assert_eq!(used.names(), ["seq-0a1b", "seq-1c2d"]);
        assert!(!used.contains("seq-4c5d"));
    }

    #[test]
    fn test_malformed_table_is_error() {
        let broken = "video,shift_type\nseq-0a1b,clear_to_foggy\n";
        assert!(SequenceTable::from_reader(broken.as_bytes()).is_err());
    }
}
