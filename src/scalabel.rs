//! The detection annotation exchange format (`det_2d.json`).
//!
//! Both the ground truth and the submission provide a Scalabel-style
//! document: a list of annotated frames plus an optional task
//! configuration carrying the category list.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Axis-aligned box in image coordinates, corners `(x1, y1)` / `(x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Box2d {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// One labeled object within a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub category: String,
    /// Detection confidence; absent on ground-truth labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box2d: Option<Box2d>,
}

/// One annotated video frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetFrame {
    /// Sequence the frame belongs to.
    pub video_name: String,
    /// Frame file name, unique within its sequence.
    pub name: String,
    /// Position within the sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_index: Option<u32>,
    #[serde(default)]
    pub labels: Vec<DetLabel>,
}

impl DetFrame {
    /// Key identifying a frame across documents.
    pub fn key(&self) -> (&str, &str) {
        (&self.video_name, &self.name)
    }
}

/// Category entry of the task configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetCategory {
    pub name: String,
}

/// Shared task configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetConfig {
    #[serde(default)]
    pub categories: Vec<DetCategory>,
}

/// A full annotation document: frames plus optional task configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetDataset {
    #[serde(default)]
    pub frames: Vec<DetFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DetConfig>,
}

impl DetDataset {
    /// Parse a document in either the enveloped form
    /// (`{"frames": [...], "config": {...}}`) or the bare frame-list form.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Document {
            Frames(Vec<DetFrame>),
            Dataset(DetDataset),
        }

        let document: Document = serde_json::from_str(raw)?;
        Ok(match document {
            Document::Frames(frames) => DetDataset {
                frames,
                config: None,
            },
            Document::Dataset(dataset) => dataset,
        })
    }

    /// Load and parse a document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Category names: the task configuration when present, otherwise the
    /// distinct label categories of the frames, in first-seen order.
    pub fn category_names(&self) -> Vec<String> {
        if let Some(config) = &self.config {
            if !config.categories.is_empty() {
                return config.categories.iter().map(|c| c.name.clone()).collect();
            }
        }
        let mut names = Vec::new();
        for frame in &self.frames {
            for label in &frame.labels {
                if !names.contains(&label.category) {
                    names.push(label.category.clone());
                }
            }
        }
        names
    }
}

/// Caller-owned cache of parsed annotation documents, keyed by path.
///
/// One cache instance per evaluation process; call [`clear`](Self::clear)
/// between unrelated runs. Loads hand out clones so the cached copy is
/// never mutated by downstream filtering.
#[derive(Debug, Default)]
pub struct AnnotationCache {
    entries: HashMap<PathBuf, DetDataset>,
}

impl AnnotationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `path`, reusing the cached document when already loaded.
    pub fn load(&mut self, path: &Path) -> Result<DetDataset> {
        if let Some(dataset) = self.entries.get(path) {
            return Ok(dataset.clone());
        }
        let dataset = DetDataset::from_path(path)?;
        self.entries.insert(path.to_path_buf(), dataset.clone());
        Ok(dataset)
    }

    /// Drop every cached document.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPED: &str = r#"{
        "frames": [
            {
                "videoName": "seq-0a1b",
                "name": "00000000_img_front.jpg",
                "frameIndex": 0,
                "labels": [
                    {
                        "id": "1",
                        "category": "car",
                        "box2d": {"x1": 10.0, "y1": 20.0, "x2": 110.0, "y2": 220.0}
                    }
                ]
            }
        ],
        "config": {"categories": [{"name": "car"}, {"name": "pedestrian"}]}
    }"#;

    const BARE_LIST: &str = r#"[
        {"videoName": "seq-0a1b", "name": "a.jpg", "frameIndex": 3, "labels": []},
        {"videoName": "seq-1c2d", "name": "b.jpg"}
    ]"#;

    #[test]
    fn test_parse_enveloped_document() {
        let dataset = DetDataset::from_json_str(ENVELOPED).unwrap();
        assert_eq!(dataset.frames.len(), 1);
        assert_eq!(dataset.frames[0].video_name, "seq-0a1b");
        assert_eq!(dataset.frames[0].frame_index, Some(0));
        assert_eq!(dataset.frames[0].labels[0].category, "car");
        assert_eq!(dataset.category_names(), ["car", "pedestrian"]);
    }

    #[test]
    fn test_parse_bare_list_document() {
        let dataset = DetDataset::from_json_str(BARE_LIST).unwrap();
        assert_eq!(dataset.frames.len(), 2);
        assert!(dataset.config.is_none());
        assert_eq!(dataset.frames[1].frame_index, None);
        assert!(dataset.frames[1].labels.is_empty());
    }

    #[test]
    fn test_categories_fall_back_to_labels() {
        let dataset = DetDataset::from_json_str(ENVELOPED).unwrap();
        let bare = DetDataset {
            frames: dataset.frames,
            config: None,
        };
        assert_eq!(bare.category_names(), ["car"]);
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("det_2d.json");
        fs::write(&path, ENVELOPED).unwrap();

        let mut cache = AnnotationCache::new();
        let first = cache.load(&path).unwrap();
        assert_eq!(cache.len(), 1);

        // A second load is served from the cache even after deletion.
        fs::remove_file(&path).unwrap();
        let second = cache.load(&path).unwrap();
        assert_eq!(first.frames.len(), second.frames.len());

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.load(&path).is_err());
    }
}
