use ab_glyph::{FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::LayoutSettings;
use crate::model::Detection;

use super::layout::{plan_placement, Cell, SideCache};

const ICON_EXTENSIONS: [&str; 2] = ["jpg", "png"];
const PEN: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Something counters can be drawn onto.
pub trait Surface {
    fn draw_icon(&mut self, x: i32, y: i32, icon: &RgbaImage);
    /// Fallback when a counter has no icon asset.
    fn draw_label(&mut self, cell: &Cell);
}

/// Decoded icons keyed by `(name, width, height)`, pre-scaled to that size.
///
/// Missing assets are remembered too so the directory is probed once per
/// name and size.
#[derive(Debug)]
pub struct IconCache {
    dir: PathBuf,
    entries: HashMap<(String, u32, u32), Option<RgbaImage>>,
}

impl IconCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, name: &str, width: u32, height: u32) -> Option<&RgbaImage> {
        let dir = &self.dir;
        self.entries
            .entry((name.to_string(), width, height))
            .or_insert_with(|| load_icon(dir, name, width, height))
            .as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_icon(dir: &Path, name: &str, width: u32, height: u32) -> Option<RgbaImage> {
    for ext in ICON_EXTENSIONS {
        let path = dir.join(format!("{name}.{ext}"));
        if !path.is_file() {
            continue;
        }
        match crate::pipeline::decode_image(&path) {
            Ok(icon) => {
                return Some(
                    icon.resize_exact(width, height, FilterType::Triangle)
                        .to_rgba8(),
                )
            }
            Err(err) => log::warn!("icon {} unreadable: {:#}", path.display(), err),
        }
    }
    None
}

/// Transparent RGBA canvas covering the screen.
pub struct CanvasSurface<'a> {
    canvas: RgbaImage,
    font: Option<&'a FontVec>,
    font_size: f32,
}

impl<'a> CanvasSurface<'a> {
    pub fn new(width: u32, height: u32, font: Option<&'a FontVec>, font_size: f32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
            font,
            font_size,
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas
    }

    /// Whether any part of a `width` x `height` area at `(x, y)` lands on the canvas.
    fn touches(&self, x: i32, y: i32, width: u32, height: u32) -> bool {
        let (cw, ch) = self.canvas.dimensions();
        let (x, y) = (i64::from(x), i64::from(y));
        x < i64::from(cw)
            && y < i64::from(ch)
            && x + i64::from(width) > 0
            && y + i64::from(height) > 0
    }
}

impl Surface for CanvasSurface<'_> {
    fn draw_icon(&mut self, x: i32, y: i32, icon: &RgbaImage) {
        if !self.touches(x, y, icon.width(), icon.height()) {
            return;
        }
        imageops::overlay(&mut self.canvas, icon, x as i64, y as i64);
    }

    fn draw_label(&mut self, cell: &Cell) {
        let text_height = self.font_size.max(0.0).ceil() as u32;
        if !self.touches(cell.x, cell.y, cell.width, cell.height.max(text_height)) {
            return;
        }
        match self.font {
            Some(font) => draw_text_mut(
                &mut self.canvas,
                PEN,
                cell.x,
                cell.y,
                PxScale::from(self.font_size),
                font,
                &cell.counter,
            ),
            None => {
                let rect =
                    Rect::at(cell.x, cell.y).of_size(cell.width.max(1), cell.height.max(1));
                draw_hollow_rect_mut(&mut self.canvas, rect, PEN);
            }
        }
    }
}

/// Draw every subject's counter grid; returns how many subjects were drawn.
///
/// An empty list draws nothing. Each drawn subject's placement is recorded in
/// `sides`.
pub fn render_detections(
    detections: &[Detection],
    layout: &LayoutSettings,
    sides: &mut SideCache,
    icons: &mut IconCache,
    surface: &mut dyn Surface,
) -> usize {
    let mut drawn = 0;
    for detection in detections {
        let Some(placement) = plan_placement(detection, layout, sides) else {
            continue;
        };
        for cell in &placement.cells {
            match icons.get(&cell.counter, cell.width, cell.height) {
                Some(icon) => surface.draw_icon(cell.x, cell.y, icon),
                None => surface.draw_label(cell),
            }
        }
        sides.record(&placement.subject_id, placement.cached());
        drawn += 1;
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Side};

    #[derive(Default)]
    struct Recorder {
        icons: Vec<(i32, i32)>,
        labels: Vec<String>,
    }

    impl Surface for Recorder {
        fn draw_icon(&mut self, x: i32, y: i32, _icon: &RgbaImage) {
            self.icons.push((x, y));
        }

        fn draw_label(&mut self, cell: &Cell) {
            self.labels.push(cell.counter.clone());
        }
    }

    #[test]
    fn icons_are_scaled_and_missing_ones_fall_back_to_text() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])).save(dir.path().join("lion.png"))?;

        let mut icons = IconCache::new(dir.path());
        let mut sides = SideCache::new();
        let mut surface = Recorder::default();
        let det = Detection::new(
            "axe",
            &["lion".to_string(), "zeus".to_string()],
            BoundingBox::new(1580, 300, 1640, 400),
        );
        let drawn = render_detections(
            &[det],
            &LayoutSettings::default(),
            &mut sides,
            &mut icons,
            &mut surface,
        );

        assert_eq!(drawn, 1);
        assert_eq!(surface.icons.len(), 1);
        assert_eq!(surface.labels, vec!["zeus".to_string()]);
        let icon = icons.get("lion", 46, 45).expect("cached icon");
        assert_eq!(icon.dimensions(), (46, 45));
        assert_eq!(sides.get("axe").map(|p| p.side), Some(Side::Right));
        Ok(())
    }

    #[test]
    fn empty_list_draws_nothing() {
        let mut sides = SideCache::new();
        let mut icons = IconCache::new("/nonexistent");
        let mut surface = Recorder::default();
        let drawn = render_detections(
            &[],
            &LayoutSettings::default(),
            &mut sides,
            &mut icons,
            &mut surface,
        );
        assert_eq!(drawn, 0);
        assert!(surface.icons.is_empty() && surface.labels.is_empty());
        assert!(sides.is_empty() && icons.is_empty());
    }

    #[test]
    fn canvas_placeholder_is_drawn_without_font() {
        let mut surface = CanvasSurface::new(100, 100, None, 16.0);
        surface.draw_label(&Cell {
            counter: "zeus".to_string(),
            x: 10,
            y: 10,
            width: 20,
            height: 20,
        });
        let canvas = surface.into_image();
        assert_eq!(canvas.get_pixel(10, 10), &PEN);
        assert_eq!(canvas.get_pixel(20, 20)[3], 0);
    }

    #[test]
    fn extreme_boxes_render_without_panicking() -> anyhow::Result<()> {
        let list = crate::bus::parse_detection_list(
            r#"[
                {"hero":"axe","counters":["lion","zeus"],"box":[-2147483648,0,2147483647,50]},
                {"hero":"pudge","counters":["ursa","zeus","lion","jakiro"],"box":[0,2147483000,50,2147483647]},
                {"hero":"lina","counters":["ursa"],"box":[0,-2147483648,50,2147483647]}
            ]"#,
        );
        assert_eq!(list.len(), 3);

        let dir = tempfile::tempdir()?;
        RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])).save(dir.path().join("zeus.png"))?;
        let mut icons = IconCache::new(dir.path());
        let mut sides = SideCache::new();
        let mut surface = CanvasSurface::new(200, 200, None, 16.0);
        let drawn = render_detections(
            &list,
            &LayoutSettings::default(),
            &mut sides,
            &mut icons,
            &mut surface,
        );

        assert_eq!(drawn, 3);
        assert_eq!(sides.len(), 3);
        assert_eq!(surface.into_image().dimensions(), (200, 200));
        Ok(())
    }

    #[test]
    fn off_canvas_cells_leave_the_canvas_untouched() {
        let mut surface = CanvasSurface::new(50, 50, None, 16.0);
        surface.draw_label(&Cell {
            counter: "zeus".to_string(),
            x: 10,
            y: i32::MAX,
            width: 46,
            height: 512,
        });
        surface.draw_icon(i32::MIN, 0, &RgbaImage::from_pixel(4, 4, PEN));
        let canvas = surface.into_image();
        assert!(canvas.pixels().all(|p| p[3] == 0));
    }
}
