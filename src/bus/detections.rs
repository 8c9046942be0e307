use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::atomic::{publish_atomic, ReplacePolicy};
use crate::model::{BoundingBox, Detection, MAX_COUNTERS};

/// The persisted detection list.
///
/// Empty file content is the encoding of "no detections yet".
#[derive(Clone, Debug)]
pub struct DetectionListFile {
    path: PathBuf,
    policy: ReplacePolicy,
}

impl DetectionListFile {
    pub fn new(path: impl Into<PathBuf>, policy: ReplacePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Publish a full snapshot of the list.
    pub fn publish(&self, list: &[Detection]) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(list).context("failed to encode detection list")?;
        publish_atomic(&self.path, &encoded, &self.policy)
    }

    /// Reset to the empty encoding.
    pub fn clear(&self) -> Result<()> {
        publish_atomic(&self.path, b"", &self.policy)
    }

    /// Read the current list. Never fails: anything unreadable is empty.
    pub fn try_read_latest(&self) -> Vec<Detection> {
        match fs::read_to_string(&self.path) {
            Ok(text) => parse_detection_list(&text),
            Err(err) => {
                log::debug!("detection list {} unreadable: {}", self.path.display(), err);
                Vec::new()
            }
        }
    }

    /// Last-modified time, or `None` when the file is absent.
    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

/// Parse a detection list leniently.
///
/// Blank or malformed content yields an empty list. Within a well-formed array
/// invalid records are dropped one by one; a repeated subject keeps its first
/// occurrence.
pub fn parse_detection_list(text: &str) -> Vec<Detection> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("detection list is not valid json: {}", err);
            return Vec::new();
        }
    };
    let Value::Array(items) = value else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(parse_record)
        .filter(|det| seen.insert(det.subject_id.clone()))
        .collect()
}

fn parse_record(value: &Value) -> Option<Detection> {
    let obj = value.as_object()?;
    let subject_id = obj.get("hero")?.as_str()?.trim();
    if subject_id.is_empty() {
        return None;
    }

    let coords = obj.get("box")?.as_array()?;
    if coords.len() != 4 {
        return None;
    }
    let mut xyxy = [0i32; 4];
    for (slot, v) in xyxy.iter_mut().zip(coords) {
        *slot = as_pixel(v)?;
    }

    let counters = match obj.get("counters") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(counter_name)
            .take(MAX_COUNTERS)
            .collect(),
        _ => Vec::new(),
    };

    Some(Detection {
        subject_id: subject_id.to_string(),
        counters,
        bbox: BoundingBox::from(xyxy),
    })
}

fn as_pixel(v: &Value) -> Option<i32> {
    if let Some(i) = v.as_i64() {
        return i32::try_from(i).ok();
    }
    let f = v.as_f64()?;
    f.is_finite().then_some(f as i32)
}

fn counter_name(v: &Value) -> Option<String> {
    let name = match v {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj.get("counter")?.as_str()?,
        _ => return None,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
