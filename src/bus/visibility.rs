use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::atomic::{publish_atomic, ReplacePolicy};
use crate::model::VisibilityState;

/// The `{enabled, detected}` visibility-state file.
#[derive(Clone, Debug)]
pub struct VisibilityFile {
    path: PathBuf,
    policy: ReplacePolicy,
}

impl VisibilityFile {
    pub fn new(path: impl Into<PathBuf>, policy: ReplacePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Current state; `enabled=true, detected=false` when unreadable.
    pub fn try_read_latest(&self) -> VisibilityState {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) => {
                log::debug!("visibility state {} unreadable: {}", self.path.display(), err);
                return VisibilityState::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|err| {
            log::debug!("visibility state {} malformed: {}", self.path.display(), err);
            VisibilityState::default()
        })
    }

    pub fn publish(&self, state: VisibilityState) -> Result<()> {
        let encoded =
            serde_json::to_vec_pretty(&state).context("failed to encode visibility state")?;
        publish_atomic(&self.path, &encoded, &self.policy)
    }

    /// Rewrite the `detected` flag, carrying over whatever `enabled` is on disk.
    pub fn publish_detected(&self, detected: bool) -> Result<()> {
        let enabled = self.try_read_latest().enabled;
        self.publish(VisibilityState { enabled, detected })
    }
}
