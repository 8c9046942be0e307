use std::collections::HashMap;

use crate::config::LayoutSettings;
use crate::model::{BoundingBox, Detection, Side, MAX_COUNTERS};

const GRID_COLUMNS: usize = 2;
/// Cells never grow past this, whatever box height the list claims.
const MAX_CELL_HEIGHT: i32 = 512;

/// Last successful draw of a subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachedPlacement {
    pub bbox: BoundingBox,
    pub side: Side,
}

/// Per-subject memory of where counters were last drawn.
///
/// Lives as long as the overlay process; used to keep a subject on its side
/// when the current box is too small or off both zones.
#[derive(Clone, Debug, Default)]
pub struct SideCache {
    entries: HashMap<String, CachedPlacement>,
}

impl SideCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subject_id: &str) -> Option<&CachedPlacement> {
        self.entries.get(subject_id)
    }

    pub fn record(&mut self, subject_id: &str, placement: CachedPlacement) {
        self.entries.insert(subject_id.to_string(), placement);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pick the panel a box belongs to.
///
/// Left only when the overlap with zone A strictly exceeds the overlap with
/// zone B. With no overlap at all the cached side wins, else right.
pub fn assign_side(bbox: &BoundingBox, layout: &LayoutSettings, cached: Option<Side>) -> Side {
    let over_a = bbox.overlap_ratio(&layout.zone_a);
    let over_b = bbox.overlap_ratio(&layout.zone_b);
    if over_a == 0.0 && over_b == 0.0 {
        if let Some(side) = cached {
            return side;
        }
    }
    if over_a > over_b {
        Side::Left
    } else {
        Side::Right
    }
}

/// One grid cell: a counter and where its icon goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub counter: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Everything needed to draw one subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub subject_id: String,
    /// The box actually used for layout (may be the cached one).
    pub bbox: BoundingBox,
    pub side: Side,
    pub cells: Vec<Cell>,
}

impl Placement {
    pub fn cached(&self) -> CachedPlacement {
        CachedPlacement {
            bbox: self.bbox,
            side: self.side,
        }
    }
}

/// Lay out up to four counters of `detection` in a 2x2 grid.
///
/// A box shorter than `min_draw_height` (or with no area) is replaced by the
/// subject's cached box and side when one exists. Returns `None` when there is
/// nothing drawable.
pub fn plan_placement(
    detection: &Detection,
    layout: &LayoutSettings,
    cache: &SideCache,
) -> Option<Placement> {
    let cached = cache.get(&detection.subject_id).copied();
    let current = detection.bbox;
    let too_small = current.is_degenerate() || current.height() < layout.min_draw_height;

    let (bbox, side) = match cached {
        Some(prev) if too_small => (prev.bbox, prev.side),
        _ => {
            let side = assign_side(&current, layout, cached.map(|c| c.side));
            (current, side)
        }
    };
    if bbox.is_degenerate() {
        return None;
    }

    let icon_w = layout.icon_width as i32;
    let icon_h = ((bbox.height() as f32 * layout.icon_height_ratio) as i32).clamp(1, MAX_CELL_HEIGHT);
    let column_x = match side {
        Side::Left => layout.left_column_x,
        Side::Right => layout.right_column_x,
    };
    let pad = layout.cell_padding;
    let base_x = column_x.saturating_sub(icon_w).saturating_sub(pad / 2);
    let base_y = bbox.y1.saturating_add(layout.vertical_offset);

    let cells = detection
        .counters
        .iter()
        .take(MAX_COUNTERS)
        .enumerate()
        .map(|(i, counter)| {
            let row = (i / GRID_COLUMNS) as i32;
            let col = (i % GRID_COLUMNS) as i32;
            Cell {
                counter: counter.clone(),
                x: base_x.saturating_add(col.saturating_mul(icon_w.saturating_add(pad))),
                y: base_y.saturating_add(row.saturating_mul(icon_h.saturating_add(pad))),
                width: icon_w as u32,
                height: icon_h as u32,
            }
        })
        .collect();

    Some(Placement {
        subject_id: detection.subject_id.clone(),
        bbox,
        side,
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn side_follows_larger_overlap() {
        let layout = LayoutSettings::default();
        let over_a = BoundingBox::new(1470, 300, 1530, 400);
        let over_b = BoundingBox::new(1580, 300, 1640, 400);
        assert_eq!(assign_side(&over_a, &layout, None), Side::Left);
        assert_eq!(assign_side(&over_b, &layout, Some(Side::Left)), Side::Right);
    }

    #[test]
    fn equal_nonzero_overlap_is_right_even_with_cache() {
        let layout = LayoutSettings {
            zone_a: BoundingBox::new(0, 0, 100, 100),
            zone_b: BoundingBox::new(0, 0, 100, 100),
            ..LayoutSettings::default()
        };
        let bbox = BoundingBox::new(10, 10, 50, 50);
        assert_eq!(assign_side(&bbox, &layout, Some(Side::Left)), Side::Right);
    }

    #[test]
    fn grid_is_two_by_two_from_box_top() {
        let layout = LayoutSettings::default();
        let det = Detection::new(
            "axe",
            &counters(&["a", "b", "c", "d"]),
            BoundingBox::new(1470, 300, 1530, 400),
        );
        let placement = plan_placement(&det, &layout, &SideCache::new()).expect("placement");
        assert_eq!(placement.side, Side::Left);

        // icon_h = 100 * 0.45 = 45; base_x = 1343 - 46 - 2
        let xy: Vec<(i32, i32)> = placement.cells.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(xy, vec![(1295, 300), (1346, 300), (1295, 350), (1346, 350)]);
        assert!(placement.cells.iter().all(|c| c.width == 46 && c.height == 45));
    }

    #[test]
    fn short_box_uses_cached_placement() {
        let layout = LayoutSettings::default();
        let mut cache = SideCache::new();
        let good = BoundingBox::new(1470, 300, 1530, 400);
        cache.record(
            "axe",
            CachedPlacement {
                bbox: good,
                side: Side::Left,
            },
        );

        let flicker = Detection::new("axe", &counters(&["a"]), BoundingBox::new(1600, 300, 1620, 310));
        let placement = plan_placement(&flicker, &layout, &cache).expect("placement");
        assert_eq!(placement.bbox, good);
        assert_eq!(placement.side, Side::Left);
    }

    #[test]
    fn short_box_without_cache_still_draws() {
        let layout = LayoutSettings::default();
        let det = Detection::new("axe", &counters(&["a"]), BoundingBox::new(1600, 300, 1620, 310));
        let placement = plan_placement(&det, &layout, &SideCache::new()).expect("placement");
        assert_eq!(placement.side, Side::Right);
        assert_eq!(placement.cells[0].height, 4);
    }

    #[test]
    fn extreme_boxes_are_laid_out_without_overflow() {
        let layout = LayoutSettings::default();
        let names = counters(&["a", "b", "c", "d"]);

        let wide = Detection::new("axe", &names, BoundingBox::new(i32::MIN, 0, i32::MAX, 50));
        let placement = plan_placement(&wide, &layout, &SideCache::new()).expect("placement");
        assert_eq!(placement.cells[0].height, 22);

        let shifted = LayoutSettings {
            vertical_offset: 100,
            ..LayoutSettings::default()
        };
        let low = Detection::new("axe", &names, BoundingBox::new(0, i32::MAX - 60, 50, i32::MAX));
        let placement = plan_placement(&low, &shifted, &SideCache::new()).expect("placement");
        assert!(placement.cells.iter().all(|c| c.y == i32::MAX));

        let tall = Detection::new("axe", &names, BoundingBox::new(0, i32::MIN, 50, i32::MAX));
        let placement = plan_placement(&tall, &layout, &SideCache::new()).expect("placement");
        assert!(placement.cells.iter().all(|c| c.height == MAX_CELL_HEIGHT as u32));
    }

    #[test]
    fn degenerate_box_without_cache_is_skipped() {
        let layout = LayoutSettings::default();
        let det = Detection::new("axe", &counters(&["a"]), BoundingBox::new(10, 10, 10, 90));
        assert!(plan_placement(&det, &layout, &SideCache::new()).is_none());
    }
}
