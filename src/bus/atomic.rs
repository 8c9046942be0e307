use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_REPLACE_RETRIES: u32 = 5;
const DEFAULT_REPLACE_DELAY_MS: u64 = 100;

/// Bounded retry policy for the final rename of an atomic publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplacePolicy {
    /// Additional attempts after the first rename fails.
    pub retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for ReplacePolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_REPLACE_RETRIES,
            delay: Duration::from_millis(DEFAULT_REPLACE_DELAY_MS),
        }
    }
}

/// Sibling temp path used while publishing `dest` (`<name>.tmp`).
pub fn tmp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    dest.with_file_name(name)
}

/// Write `data` to `dest` so that concurrent readers see either the old or
/// the new content, never a mix.
///
/// The bytes go to a sibling temp file which is flushed and synced before it
/// is renamed over `dest`. On failure the temp file is removed and the last
/// I/O error is returned.
pub fn publish_atomic(dest: &Path, data: &[u8], policy: &ReplacePolicy) -> Result<()> {
    let tmp_path = tmp_path_for(dest);
    if let Err(err) = write_synced(&tmp_path, data) {
        remove_orphan(&tmp_path);
        return Err(err).with_context(|| format!("failed to stage {}", tmp_path.display()));
    }
    replace_with_retry(&tmp_path, dest, policy, |src, dst| fs::rename(src, dst))
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.flush()?;
    file.sync_all()
}

/// Rename `src` over `dst`, retrying while the destination is held by a
/// reader. A read-only attribute on `dst` is cleared between attempts.
pub(crate) fn replace_with_retry<F>(
    src: &Path,
    dst: &Path,
    policy: &ReplacePolicy,
    mut rename: F,
) -> Result<()>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let mut last_err = match rename(src, dst) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };

    for attempt in 1..=policy.retries {
        clear_readonly(dst);
        match rename(src, dst) {
            Ok(()) => {
                log::debug!("replaced {} on retry {}", dst.display(), attempt);
                return Ok(());
            }
            Err(err) => last_err = err,
        }
        std::thread::sleep(policy.delay);
    }

    remove_orphan(src);
    Err(anyhow::Error::new(last_err).context(format!(
        "failed to replace {} after {} retries",
        dst.display(),
        policy.retries
    )))
}

#[allow(clippy::permissions_set_readonly_false)]
fn clear_readonly(path: &Path) {
    let Ok(meta) = fs::metadata(path) else {
        return;
    };
    let mut perms = meta.permissions();
    if perms.readonly() {
        perms.set_readonly(false);
        if let Err(err) = fs::set_permissions(path, perms) {
            log::debug!("could not clear read-only on {}: {}", path.display(), err);
        }
    }
}

fn remove_orphan(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => log::debug!("could not remove {}: {}", path.display(), err),
    }
}
