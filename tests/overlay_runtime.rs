use std::fs;

use anyhow::Result;
use image::RgbaImage;

use counterpick::config::{CounterpickConfig, LayoutSettings};
use counterpick::overlay::{
    plan_placement, render_detections, Cell, FixedFocusProbe, GateState, IconCache, Overlay,
    OverlayWindow, SideCache, Surface,
};
use counterpick::{BoundingBox, Detection, DetectionListFile, Side, VisibilityFile, VisibilityState};

#[derive(Default)]
struct RecordingWindow {
    visible: bool,
    frames: Vec<RgbaImage>,
    shows: usize,
    hides: usize,
}

impl OverlayWindow for RecordingWindow {
    fn show(&mut self) -> Result<()> {
        self.visible = true;
        self.shows += 1;
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        self.visible = false;
        self.hides += 1;
        Ok(())
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

struct NullSurface;

impl Surface for NullSurface {
    fn draw_icon(&mut self, _x: i32, _y: i32, _icon: &RgbaImage) {}
    fn draw_label(&mut self, _cell: &Cell) {}
}

fn counters(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn publish_state(cfg: &CounterpickConfig, enabled: bool, detected: bool) -> Result<()> {
    VisibilityFile::new(&cfg.paths.visibility, cfg.publish)
        .publish(VisibilityState { enabled, detected })
}

fn overlay(cfg: &CounterpickConfig, title: &str) -> Overlay<RecordingWindow, FixedFocusProbe> {
    Overlay::new(
        cfg,
        RecordingWindow::default(),
        FixedFocusProbe::new(Some(title.to_string())),
    )
}

#[test]
fn malformed_list_reads_as_empty_and_draws_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = CounterpickConfig::with_base_dir(dir.path());
    fs::write(&cfg.paths.detections, "{ bad json")?;

    let mut overlay = overlay(&cfg, "Dota 2");
    assert!(overlay.refresh_data());
    assert!(overlay.detections().is_empty());
    let frame = overlay.render_frame();
    assert!(frame.pixels().all(|p| p[3] == 0));
    assert!(overlay.side_cache().is_empty());
    Ok(())
}

#[test]
fn invalid_records_are_dropped_individually() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = CounterpickConfig::with_base_dir(dir.path());
    fs::write(
        &cfg.paths.detections,
        r#"[
            {"hero": "axe", "counters": ["lion"], "box": [1470, 300, 1530, 400]},
            {"hero": "pudge", "counters": ["ursa"], "box": [1, 2, 3]},
            {"counters": ["zeus"], "box": [1, 2, 3, 4]},
            {"hero": "sven", "counters": [{"counter": "viper"}], "box": [1580, 300, 1640, 400]}
        ]"#,
    )?;

    let mut overlay = overlay(&cfg, "Dota 2");
    overlay.refresh_data();
    let ids: Vec<&str> = overlay
        .detections()
        .iter()
        .map(|d| d.subject_id.as_str())
        .collect();
    assert_eq!(ids, vec!["axe", "sven"]);
    assert_eq!(overlay.detections()[1].counters, vec!["viper"]);
    Ok(())
}

#[test]
fn visible_only_when_enabled_detected_and_focused() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = CounterpickConfig::with_base_dir(dir.path());
    let mut overlay = overlay(&cfg, "DOTA 2");

    // missing state file fails toward hidden
    assert_eq!(overlay.refresh_visibility(), None);
    assert_eq!(overlay.gate_state(), GateState::Hidden);

    publish_state(&cfg, true, true)?;
    assert_eq!(overlay.refresh_visibility(), Some(GateState::Visible));
    assert!(overlay.window().is_visible());

    publish_state(&cfg, false, true)?;
    assert_eq!(overlay.refresh_visibility(), Some(GateState::Hidden));

    publish_state(&cfg, true, false)?;
    assert_eq!(overlay.refresh_visibility(), None);

    publish_state(&cfg, true, true)?;
    assert_eq!(overlay.refresh_visibility(), Some(GateState::Visible));
    overlay.probe_mut().set_title(Some("Terminal".to_string()));
    assert_eq!(overlay.refresh_visibility(), Some(GateState::Hidden));
    overlay.probe_mut().set_title(None);
    assert_eq!(overlay.refresh_visibility(), None);

    fs::write(&cfg.paths.visibility, "not json")?;
    overlay.probe_mut().set_title(Some("Dota 2".to_string()));
    assert_eq!(overlay.refresh_visibility(), None);
    assert_eq!(overlay.window().shows, 2);
    assert_eq!(overlay.window().hides, 2);
    Ok(())
}

#[test]
fn frames_are_presented_only_while_visible() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = CounterpickConfig::with_base_dir(dir.path());
    DetectionListFile::new(&cfg.paths.detections, cfg.publish).publish(&[Detection::new(
        "axe",
        &counters(&["lion", "zeus", "viper", "lina"]),
        BoundingBox::new(1470, 300, 1530, 400),
    )])?;

    let mut overlay = overlay(&cfg, "Dota 2");
    overlay.refresh_data();
    overlay.redraw_if_needed();
    assert!(overlay.window().frames.is_empty());

    publish_state(&cfg, true, true)?;
    overlay.refresh_visibility();
    overlay.redraw_if_needed();
    assert_eq!(overlay.window().frames.len(), 1);
    assert!(overlay.window().frames[0].pixels().any(|p| p[3] != 0));
    assert_eq!(overlay.side_cache().get("axe").map(|p| p.side), Some(Side::Left));

    // nothing changed: no redraw
    overlay.refresh_data();
    overlay.redraw_if_needed();
    assert_eq!(overlay.window().frames.len(), 1);
    Ok(())
}

#[test]
fn missing_icon_is_drawn_as_text_with_default_font() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = CounterpickConfig::with_base_dir(dir.path());
    if cfg.overlay.font_path.is_none() {
        eprintln!("skipping: no bundled or system font on this machine");
        return Ok(());
    }
    DetectionListFile::new(&cfg.paths.detections, cfg.publish).publish(&[Detection::new(
        "axe",
        &counters(&["lion"]),
        BoundingBox::new(1470, 300, 1530, 400),
    )])?;

    let mut overlay = overlay(&cfg, "Dota 2");
    overlay.refresh_data();
    let frame = overlay.render_frame();

    // cell at (1295, 300), 46x45: a placeholder box would only touch its border
    let inked = (1296..1340)
        .flat_map(|x| (301..344).map(move |y| (x, y)))
        .filter(|&(x, y)| frame.get_pixel(x, y)[3] != 0)
        .count();
    assert!(inked > 0);
    Ok(())
}

#[test]
fn zero_overlap_defaults_right_without_history() {
    let layout = LayoutSettings::default();
    let det = Detection::new("axe", &counters(&["lion"]), BoundingBox::new(100, 300, 160, 400));
    let placement = plan_placement(&det, &layout, &SideCache::new()).expect("placement");
    assert_eq!(placement.side, Side::Right);
}

#[test]
fn zero_overlap_reuses_cached_left() {
    let layout = LayoutSettings::default();
    let mut sides = SideCache::new();
    let mut icons = IconCache::new("/nonexistent");

    let on_left = Detection::new("axe", &counters(&["lion"]), BoundingBox::new(1470, 300, 1530, 400));
    render_detections(&[on_left], &layout, &mut sides, &mut icons, &mut NullSurface);
    assert_eq!(sides.get("axe").map(|p| p.side), Some(Side::Left));

    let off_zones = Detection::new("axe", &counters(&["lion"]), BoundingBox::new(100, 300, 160, 400));
    render_detections(&[off_zones], &layout, &mut sides, &mut icons, &mut NullSurface);
    let cached = sides.get("axe").expect("cached");
    assert_eq!(cached.side, Side::Left);
    assert_eq!(cached.bbox, BoundingBox::new(100, 300, 160, 400));
}
