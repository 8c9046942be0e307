//! Detector pipeline.
//!
//! One cycle takes the oldest pending spool image through
//! `PENDING -> SIZE-STABLE -> DECODED -> INFERRED -> MERGED/DISCARDED`:
//!
//! 1. wait (bounded) for the file to reach a minimum size, else discard it;
//! 2. decode it, discarding undecodable files;
//! 3. run the backend; a backend failure is the only fatal outcome;
//! 4. keep the most confident box per subject and drop subjects without
//!    counters;
//! 5. publish `detected` for this frame, then append never-seen subjects to
//!    the persisted list (read fresh from disk every cycle);
//! 6. delete the image.
//!
//! Cycles never overlap. Publish failures are logged and the loop carries on.

mod frame;
mod merge;
mod spool;

pub use frame::dedup_frame;
pub use merge::merge_new_subjects;
pub use spool::{discard, wait_until_stable, Spool};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bus::{DetectionListFile, VisibilityFile};
use crate::config::{CounterpickConfig, DetectorSettings};
use crate::counters::CountersDb;
use crate::detect::DetectorBackend;

/// Why an image left the pipeline without inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    /// Never reached the minimum size within the stability budget.
    Unstable,
    /// Could not be decoded as an image.
    Undecodable,
}

/// Result of one pipeline cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing pending in the spool.
    Idle,
    Discarded {
        path: PathBuf,
        reason: DiscardReason,
    },
    Processed {
        path: PathBuf,
        /// Subjects left after per-frame dedup and counter lookup.
        surviving: usize,
        /// Subjects newly appended to the persisted list.
        appended: usize,
    },
}

pub struct DetectorPipeline {
    spool: Spool,
    backend: Box<dyn DetectorBackend>,
    counters: CountersDb,
    detections: DetectionListFile,
    visibility: VisibilityFile,
    settings: DetectorSettings,
}

impl DetectorPipeline {
    pub fn new(
        cfg: &CounterpickConfig,
        backend: Box<dyn DetectorBackend>,
        counters: CountersDb,
    ) -> Self {
        Self {
            spool: Spool::new(&cfg.paths.spool_dir, cfg.detector.extensions.clone()),
            backend,
            counters,
            detections: DetectionListFile::new(&cfg.paths.detections, cfg.publish),
            visibility: VisibilityFile::new(&cfg.paths.visibility, cfg.publish),
            settings: cfg.detector.clone(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Check the backend can run at all.
    pub fn ensure_ready(&mut self) -> Result<()> {
        self.backend
            .ensure_ready()
            .with_context(|| format!("detector backend '{}' is not ready", self.backend.name()))
    }

    /// Startup: create the spool, start from an empty detection list and
    /// make sure the visibility file exists (keeping `enabled` and `detected`
    /// if it already does).
    pub fn prepare(&mut self) -> Result<()> {
        self.spool
            .ensure_exists()
            .with_context(|| format!("failed to create spool {}", self.spool.dir().display()))?;
        self.detections.clear()?;
        let detected = if self.visibility.exists() {
            self.visibility.try_read_latest().detected
        } else {
            false
        };
        self.visibility.publish_detected(detected)?;
        Ok(())
    }

    /// Run one cycle. `Err` only for a hard inference failure.
    pub fn step(&mut self) -> Result<CycleOutcome> {
        let path = match self.spool.oldest_pending() {
            Ok(Some(path)) => path,
            Ok(None) => return Ok(CycleOutcome::Idle),
            Err(err) => {
                log::warn!("cannot scan spool {}: {}", self.spool.dir().display(), err);
                return Ok(CycleOutcome::Idle);
            }
        };

        if !wait_until_stable(
            &path,
            self.settings.min_image_bytes,
            self.settings.stability_attempts,
            self.settings.stability_interval,
        ) {
            log::debug!("discarding undersized image {}", path.display());
            discard(&path);
            return Ok(CycleOutcome::Discarded {
                path,
                reason: DiscardReason::Unstable,
            });
        }

        let image = match decode_image(&path) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("discarding undecodable image {}: {:#}", path.display(), err);
                discard(&path);
                return Ok(CycleOutcome::Discarded {
                    path,
                    reason: DiscardReason::Undecodable,
                });
            }
        };

        let raw = self
            .backend
            .infer(&image, &self.settings.params)
            .with_context(|| format!("inference failed on {}", path.display()))?;
        let raw_count = raw.len();

        let counters = &self.counters;
        let frame = dedup_frame(raw, self.settings.min_box_height, |subject| {
            counters.counters_for(subject)
        });
        let surviving = frame.len();

        if let Err(err) = self.visibility.publish_detected(surviving > 0) {
            log::warn!("failed to publish visibility state: {:#}", err);
        }

        let mut appended = 0;
        if surviving > 0 {
            let previous = self.detections.try_read_latest();
            if let Some(merged) = merge_new_subjects(&previous, frame) {
                let added = merged.len() - previous.len();
                match self.detections.publish(&merged) {
                    Ok(()) => appended = added,
                    Err(err) => log::warn!("failed to publish detection list: {:#}", err),
                }
            }
        }

        log::debug!(
            "{}: raw={} surviving={} appended={}",
            path.display(),
            raw_count,
            surviving,
            appended
        );
        discard(&path);
        Ok(CycleOutcome::Processed {
            path,
            surviving,
            appended,
        })
    }

    /// Cycle until `shutdown` is raised or inference fails.
    ///
    /// `detected` is forced to false on the way out in both cases.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let result = loop {
            if shutdown.load(Ordering::SeqCst) {
                break Ok(());
            }
            match self.step() {
                Ok(CycleOutcome::Idle) => std::thread::sleep(self.settings.idle_interval),
                Ok(CycleOutcome::Processed { appended, .. }) if appended > 0 => {
                    log::info!("{} new subject(s) published", appended);
                }
                Ok(_) => {}
                Err(err) => break Err(err),
            }
        };
        self.finish();
        result
    }

    /// Force `detected=false`.
    pub fn finish(&self) {
        if let Err(err) = self.visibility.publish_detected(false) {
            log::warn!("failed to clear detected flag: {:#}", err);
        }
    }
}

/// Decode by content; the extension only selects which files are picked up.
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let reader = ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to sniff format of {}", path.display()))?;
    reader
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))
}
