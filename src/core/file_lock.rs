//! Run lock using flock(2): one provisioning run per host at a time.

use crate::error::ProvisionError;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Held for the whole run. Released on drop (file close releases flock).
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    /// Take the lock without blocking; a concurrent run yields [`ProvisionError::Locked`].
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("open lock file {}", path.display()))?;
        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return Err(locked(path)),
            // fs2 on Linux may return Other instead of WouldBlock
            Err(ref e) if e.raw_os_error() == Some(11) => return Err(locked(path)), // EAGAIN
            Err(e) => return Err(e).with_context(|| format!("lock {}", path.display())),
        }
        file.set_len(0).ok();
        writeln!(file, "{}", std::process::id()).ok();
        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn locked(path: &Path) -> anyhow::Error {
    ProvisionError::Locked {
        lock: path.display().to_string(),
    }
    .into()
}
