//! Counterpick
//!
//! A draft-phase helper made of three cooperating processes that share
//! nothing but files:
//!
//! - a capturer drops screenshots into a spool directory;
//! - the **detector** consumes them one at a time, finds on-screen subjects,
//!   looks up their counters and publishes a session-wide detection list plus
//!   a per-frame `detected` flag;
//! - the **overlay** polls both files and draws each subject's counters in a
//!   2x2 icon grid beside its drafting panel while the game has focus.
//!
//! Every shared file is replaced atomically (write temp, sync, rename) and
//! every reader treats anything unreadable as "no data".
//!
//! # Module Structure
//!
//! - `bus`: atomic publish primitive and the typed shared-file channels
//! - `pipeline`: the detector state machine
//! - `overlay`: feed, visibility gate, layout, rendering and window
//! - `detect`: inference backends behind [`detect::DetectorBackend`]
//! - `session`: launcher reset contract

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod bus;
pub mod config;
pub mod counters;
pub mod detect;
pub mod instance;
pub mod model;
pub mod notify;
pub mod overlay;
pub mod pipeline;
pub mod session;

pub use bus::{DetectionListFile, ReplacePolicy, VisibilityFile};
pub use config::CounterpickConfig;
pub use counters::CountersDb;
pub use instance::InstanceLock;
pub use model::{BoundingBox, Detection, Side, VisibilityState, MAX_COUNTERS};
pub use notify::Notifier;
pub use pipeline::{CycleOutcome, DetectorPipeline, DiscardReason};

/// Detector process exit statuses.
pub mod exit_code {
    /// Normal exit, interrupt, or another instance already running.
    pub const OK: u8 = 0;
    /// The single-instance lock (or another startup resource) is unavailable.
    pub const RESOURCE_UNAVAILABLE: u8 = 1;
    /// The configured inference backend cannot run on this machine.
    pub const BACKEND_UNAVAILABLE: u8 = 2;
    /// Inference failed at runtime.
    pub const INFERENCE_FAILED: u8 = 3;
}

/// Flag raised on SIGINT/SIGTERM.
pub fn install_shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("error setting termination handler")?;
    Ok(flag)
}
