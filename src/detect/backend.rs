use anyhow::Result;
use image::DynamicImage;

use super::result::{InferenceParams, RawDetection};

/// Detector backend trait.
///
/// A backend turns one decoded frame into raw, unfiltered detections. It must
/// not touch the shared state files; deduplication, counter lookup and
/// publication belong to the pipeline.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Verify that the model and its execution device are usable.
    ///
    /// Called once before the spool is polled. A failure here means the
    /// process cannot do its job at all.
    fn ensure_ready(&mut self) -> Result<()> {
        Ok(())
    }

    /// Run inference on a frame.
    ///
    /// An `Err` is a hard runtime failure of the backend, not "nothing found".
    fn infer(&mut self, image: &DynamicImage, params: &InferenceParams)
        -> Result<Vec<RawDetection>>;
}
