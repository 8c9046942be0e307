//! Launcher file-reset contract.
//!
//! A session starts and stops by resetting the shared files to the state the
//! detector and overlay expect: an empty detection list, `detected=false`,
//! `enabled` set for the new session, and no stale frames in the spool.

use anyhow::{Context, Result};
use std::fs;
use std::io;

use crate::bus::{DetectionListFile, VisibilityFile};
use crate::config::CounterpickConfig;
use crate::model::VisibilityState;
use crate::pipeline::{discard, Spool};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Stop,
}

impl SessionAction {
    fn enabled(self) -> bool {
        matches!(self, SessionAction::Start)
    }
}

/// What a reset touched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub state: VisibilityState,
    pub spool_files_removed: usize,
}

pub fn reset_session(cfg: &CounterpickConfig, action: SessionAction) -> Result<SessionReport> {
    DetectionListFile::new(&cfg.paths.detections, cfg.publish)
        .clear()
        .context("failed to reset detection list")?;

    let state = VisibilityState {
        enabled: action.enabled(),
        detected: false,
    };
    VisibilityFile::new(&cfg.paths.visibility, cfg.publish)
        .publish(state)
        .context("failed to reset visibility state")?;

    let spool = Spool::new(&cfg.paths.spool_dir, cfg.detector.extensions.clone());
    let spool_files_removed = clear_spool(&spool)?;
    log::info!(
        "session {:?}: enabled={} ({} spool file(s) removed)",
        action,
        state.enabled,
        spool_files_removed
    );
    Ok(SessionReport {
        state,
        spool_files_removed,
    })
}

/// Remove every pending image. A missing spool directory is created.
pub fn clear_spool(spool: &Spool) -> Result<usize> {
    let pending = match spool.pending() {
        Ok(pending) => pending,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            spool.ensure_exists().with_context(|| {
                format!("failed to create spool {}", spool.dir().display())
            })?;
            return Ok(0);
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to list spool {}", spool.dir().display()))
        }
    };
    for path in &pending {
        discard(path);
    }
    Ok(pending.iter().filter(|p| fs::metadata(p).is_err()).count())
}
