use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// The spool directory the capturer drops timestamped frames into.
#[derive(Clone, Debug)]
pub struct Spool {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl Spool {
    pub fn new(dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            extensions,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_exists(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// The single oldest pending image, by creation time.
    ///
    /// Platforms without a creation timestamp fall back to modification time.
    /// Ties are broken by directory order.
    pub fn oldest_pending(&self) -> io::Result<Option<PathBuf>> {
        let mut oldest: Option<(SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !self.is_image(&path) {
                continue;
            }
            // the capturer or a cleanup may remove files under us
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let stamp = meta
                .created()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if oldest.as_ref().map_or(true, |(best, _)| stamp < *best) {
                oldest = Some((stamp, path));
            }
        }
        Ok(oldest.map(|(_, path)| path))
    }

    /// Every pending image, in no particular order.
    pub fn pending(&self) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && self.is_image(&path) {
                out.push(path);
            }
        }
        Ok(out)
    }

    fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

/// Poll the file size until it reaches `min_bytes`.
///
/// Returns `false` when the budget of `attempts` polls runs out first. A
/// missing file counts as zero bytes.
pub fn wait_until_stable(path: &Path, min_bytes: u64, attempts: u32, interval: Duration) -> bool {
    for attempt in 0..attempts {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size >= min_bytes {
            return true;
        }
        if attempt + 1 < attempts {
            std::thread::sleep(interval);
        }
    }
    false
}

/// Remove a consumed or rejected image. Already-gone files are not an error.
pub fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => log::warn!("could not remove spool file {}: {}", path.display(), err),
    }
}
