//! One running instance per process role.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exclusive advisory lock held for the life of the process.
///
/// Dropping it releases the lock.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    _file: File,
}

impl InstanceLock {
    /// Take the `<role>` lock in `dir`.
    ///
    /// `Ok(None)` means another instance holds it. `Err` means the lock file
    /// itself could not be created.
    pub fn acquire(dir: &Path, role: &str) -> Result<Option<Self>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create lock directory {}", dir.display()))?;
        let path = dir.join(format!("counterpick_{role}.lock"));
        let Some(mut file) = lock_file(&path)? else {
            return Ok(None);
        };
        // best effort; the lock is what matters
        let _ = file
            .set_len(0)
            .and_then(|_| writeln!(file, "{}", std::process::id()));
        Ok(Some(Self { path, _file: file }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn lock_file(path: &Path) -> Result<Option<File>> {
    use std::os::unix::io::AsRawFd;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open lock file {}", path.display()))?;
    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(Some(file));
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(None);
    }
    Err(err).with_context(|| format!("failed to lock {}", path.display()))
}

#[cfg(not(unix))]
fn lock_file(path: &Path) -> Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to create lock file {}", path.display())),
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // flock goes away with the descriptor; the create-new marker does not
        if cfg!(not(unix)) {
            let _ = fs::remove_file(&self.path);
        }
    }
}
