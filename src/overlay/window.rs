use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::bus::{publish_atomic, ReplacePolicy};

/// A transparent, click-through, always-on-top surface.
pub trait OverlayWindow {
    fn show(&mut self) -> Result<()>;
    fn hide(&mut self) -> Result<()>;
    fn is_visible(&self) -> bool;
    /// Replace the window contents.
    fn present(&mut self, frame: &RgbaImage) -> Result<()>;
}

/// Publishes the overlay as an RGBA PNG for an external compositor.
///
/// While hidden the published frame is fully transparent; the last presented
/// frame is kept and re-published on `show`.
#[derive(Debug)]
pub struct FrameFileWindow {
    path: PathBuf,
    policy: ReplacePolicy,
    width: u32,
    height: u32,
    visible: bool,
    last_frame: Option<RgbaImage>,
}

impl FrameFileWindow {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32, policy: ReplacePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            width,
            height,
            visible: false,
            last_frame: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, frame: &RgbaImage) -> Result<()> {
        let mut encoded = Vec::new();
        frame
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .context("failed to encode overlay frame")?;
        publish_atomic(&self.path, &encoded, &self.policy)
    }

    fn write_transparent(&self) -> Result<()> {
        self.write(&RgbaImage::new(self.width, self.height))
    }
}

impl OverlayWindow for FrameFileWindow {
    fn show(&mut self) -> Result<()> {
        self.visible = true;
        match &self.last_frame {
            Some(frame) => self.write(frame),
            None => self.write_transparent(),
        }
    }

    fn hide(&mut self) -> Result<()> {
        self.visible = false;
        self.write_transparent()
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        self.last_frame = Some(frame.clone());
        if self.visible {
            self.write(frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn hidden_window_publishes_transparent_frames() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("frame.png");
        let mut window = FrameFileWindow::new(&path, 4, 4, ReplacePolicy::default());

        let frame = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        window.present(&frame)?;
        assert!(!path.exists());

        window.show()?;
        assert!(window.is_visible());
        assert_eq!(image::open(&path)?.to_rgba8().get_pixel(0, 0), &Rgba([1, 2, 3, 255]));

        window.hide()?;
        assert_eq!(image::open(&path)?.to_rgba8().get_pixel(0, 0)[3], 0);
        Ok(())
    }
}
