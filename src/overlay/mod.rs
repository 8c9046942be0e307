//! Overlay component.
//!
//! Reads the detection list and the visibility state published by the
//! detector and draws each subject's counters beside its drafting panel.
//! Two independent tickers drive it: one for data refresh, one for the
//! visibility gate. Nothing read from disk can make it exit; unusable data is
//! treated as "nothing to show".

mod feed;
mod focus;
mod layout;
mod render;
mod visibility;
mod window;

pub use feed::DetectionFeed;
pub use focus::{is_game_focused, CommandFocusProbe, FixedFocusProbe, FocusProbe};
pub use layout::{assign_side, plan_placement, CachedPlacement, Cell, Placement, SideCache};
pub use render::{render_detections, CanvasSurface, IconCache, Surface};
pub use visibility::{should_show, GateState, VisibilityGate};
pub use window::{FrameFileWindow, OverlayWindow};

use ab_glyph::FontVec;
use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::bus::{DetectionListFile, VisibilityFile};
use crate::config::{CounterpickConfig, OverlaySettings};

/// Fixed-rate deadline tracker.
#[derive(Clone, Copy, Debug)]
struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now,
        }
    }

    /// `true` once per elapsed interval. Missed ticks are skipped, not queued.
    fn fire(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.interval;
        if self.next <= now {
            self.next = now + self.interval;
        }
        true
    }
}

pub struct Overlay<W: OverlayWindow, P: FocusProbe> {
    feed: DetectionFeed,
    gate: VisibilityGate,
    probe: P,
    window: W,
    settings: OverlaySettings,
    sides: SideCache,
    icons: IconCache,
    font: Option<FontVec>,
    dirty: bool,
}

impl<W: OverlayWindow, P: FocusProbe> Overlay<W, P> {
    pub fn new(cfg: &CounterpickConfig, window: W, probe: P) -> Self {
        let font = match cfg.overlay.font_path.as_deref() {
            Some(path) => match load_font(path) {
                Ok(font) => Some(font),
                Err(err) => {
                    log::warn!("text fallback will use placeholders: {:#}", err);
                    None
                }
            },
            None => {
                log::warn!("no font found; counters without icons are drawn as placeholder boxes");
                None
            }
        };
        Self {
            feed: DetectionFeed::new(DetectionListFile::new(&cfg.paths.detections, cfg.publish)),
            gate: VisibilityGate::new(
                VisibilityFile::new(&cfg.paths.visibility, cfg.publish),
                cfg.overlay.game_title.clone(),
            ),
            probe,
            window,
            settings: cfg.overlay.clone(),
            sides: SideCache::new(),
            icons: IconCache::new(&cfg.paths.icons_dir),
            font,
            dirty: true,
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn detections(&self) -> &[crate::model::Detection] {
        self.feed.current()
    }

    pub fn side_cache(&self) -> &SideCache {
        &self.sides
    }

    /// Data ticker: reload the list if the file changed.
    pub fn refresh_data(&mut self) -> bool {
        let changed = self.feed.poll();
        self.dirty |= changed;
        changed
    }

    /// Visibility ticker: apply a `HIDDEN <-> VISIBLE` transition, if any.
    pub fn refresh_visibility(&mut self) -> Option<GateState> {
        let transition = self.gate.evaluate(&mut self.probe)?;
        let result = match transition {
            GateState::Visible => {
                self.dirty = true;
                self.window.show()
            }
            GateState::Hidden => self.window.hide(),
        };
        if let Err(err) = result {
            log::warn!("overlay window update failed: {:#}", err);
        }
        log::debug!("overlay {:?}", transition);
        Some(transition)
    }

    /// Redraw into the window if something changed while it is visible.
    pub fn redraw_if_needed(&mut self) {
        if !self.dirty || !self.window.is_visible() {
            return;
        }
        let frame = self.render_frame();
        if let Err(err) = self.window.present(&frame) {
            log::warn!("overlay frame not presented: {:#}", err);
        }
        self.dirty = false;
    }

    /// Render the current list onto a fresh transparent frame.
    pub fn render_frame(&mut self) -> RgbaImage {
        let mut surface = CanvasSurface::new(
            self.settings.screen_width,
            self.settings.screen_height,
            self.font.as_ref(),
            self.settings.font_size,
        );
        let detections = self.feed.current();
        if !detections.is_empty() {
            render_detections(
                detections,
                &self.settings.layout,
                &mut self.sides,
                &mut self.icons,
                &mut surface,
            );
        }
        surface.into_image()
    }

    /// Drive both tickers until `shutdown` is raised, then hide.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        let now = Instant::now();
        let mut data = Ticker::new(self.settings.data_interval, now);
        let mut visibility = Ticker::new(self.settings.visibility_interval, now);

        while !shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if data.fire(now) {
                self.refresh_data();
            }
            if visibility.fire(now) {
                self.refresh_visibility();
            }
            self.redraw_if_needed();

            let wake = data.next.min(visibility.next);
            let now = Instant::now();
            if wake > now {
                std::thread::sleep(wake - now);
            }
        }

        if let Err(err) = self.window.hide() {
            log::warn!("failed to hide overlay on shutdown: {:#}", err);
        }
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read font {}", path.display()))?;
    FontVec::try_from_vec(data).map_err(|_| anyhow!("{} is not a usable font", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_fires_once_per_interval_and_skips_missed_ticks() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_millis(300), start);
        assert!(ticker.fire(start));
        assert!(!ticker.fire(start + Duration::from_millis(100)));
        assert!(ticker.fire(start + Duration::from_millis(300)));
        assert!(ticker.fire(start + Duration::from_millis(2000)));
        assert!(!ticker.fire(start + Duration::from_millis(2100)));
        assert_eq!(ticker.next, start + Duration::from_millis(2300));
    }
}
