use std::time::SystemTime;

use crate::bus::DetectionListFile;
use crate::model::Detection;

/// Overlay-side reader of the detection list.
///
/// Re-parses only when the file's modification time moves. A missing file or
/// unusable content leaves an empty list.
#[derive(Debug)]
pub struct DetectionFeed {
    file: DetectionListFile,
    // Outer `None`: never polled. Inner `None`: file was absent.
    last_seen: Option<Option<SystemTime>>,
    current: Vec<Detection>,
}

impl DetectionFeed {
    pub fn new(file: DetectionListFile) -> Self {
        Self {
            file,
            last_seen: None,
            current: Vec::new(),
        }
    }

    /// Check the file and reload it if it changed since the last poll.
    ///
    /// Returns `true` when the in-memory list was replaced.
    pub fn poll(&mut self) -> bool {
        let modified = self.file.modified();
        if self.last_seen == Some(modified) {
            return false;
        }
        self.last_seen = Some(modified);
        self.current = match modified {
            Some(_) => self.file.try_read_latest(),
            None => Vec::new(),
        };
        log::debug!(
            "detection list reloaded from {} ({} record(s))",
            self.file.path().display(),
            self.current.len()
        );
        true
    }

    pub fn current(&self) -> &[Detection] {
        &self.current
    }
}
