//! Wire types shared by the detector and the overlay.
//!
//! These are the records that cross the process boundary through the shared
//! files. Field names are part of the file protocol (`hero`, `counters`, `box`,
//! `enabled`, `detected`) and must not change.

use serde::{Deserialize, Serialize};

/// Maximum number of counters carried per subject.
pub const MAX_COUNTERS: usize = 4;

/// Axis-aligned box in screen pixels, serialized as `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Saturates instead of overflowing on extreme coordinates.
    pub fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1)
    }

    /// A box with no area cannot be laid out or drawn.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_degenerate() {
            0
        } else {
            (self.x2 as i64 - self.x1 as i64) * (self.y2 as i64 - self.y1 as i64)
        }
    }

    /// Intersection area divided by this box's own area.
    ///
    /// Returns exactly `0.0` when the boxes do not intersect or this box is
    /// degenerate.
    pub fn overlap_ratio(&self, zone: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(zone.x1) as i64;
        let iy1 = self.y1.max(zone.y1) as i64;
        let ix2 = self.x2.min(zone.x2) as i64;
        let iy2 = self.y2.min(zone.y2) as i64;
        let inter = (ix2 - ix1).max(0) * (iy2 - iy1).max(0);
        let own = self.area();
        if inter == 0 || own == 0 {
            return 0.0;
        }
        inter as f64 / own as f64
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One surfaced subject: who was seen, what counters it, and where.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "hero")]
    pub subject_id: String,
    pub counters: Vec<String>,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Detection {
    /// Builds a record, keeping at most [`MAX_COUNTERS`] counters.
    pub fn new(subject_id: impl Into<String>, counters: &[String], bbox: BoundingBox) -> Self {
        Self {
            subject_id: subject_id.into(),
            counters: counters.iter().take(MAX_COUNTERS).cloned().collect(),
            bbox,
        }
    }
}

/// Contents of the visibility-state file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityState {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub detected: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for VisibilityState {
    /// The fail-toward-hidden default used whenever the file is unreadable.
    fn default() -> Self {
        Self {
            enabled: true,
            detected: false,
        }
    }
}

/// Which drafting panel a subject's counters are drawn beside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}
