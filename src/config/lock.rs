//! Advisory locking for the registry file.
//!
//! Writes to the registry take an exclusive lock on a sibling `.lock`
//! file. Acquisition is non-blocking with a short retry budget so that a
//! contended tool call fails with a diagnostic instead of hanging the
//! whole stdio session.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use fs2::FileExt;

use crate::error::ConfigError;

/// Retry attempts before reporting contention.
const LOCK_ATTEMPTS: u32 = 3;

/// Pause between attempts.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Lock guard that releases and removes the lock file on drop.
#[derive(Debug)]
pub struct ConfigLock {
    file: File,
    path: PathBuf,
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        // Best-effort unlock and removal; ignore errors
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Sibling lock path for a registry file.
#[must_use]
pub fn lock_path_for(config_path: &Path) -> PathBuf {
    let mut name = config_path
        .file_name()
        .map_or_else(|| "config.yaml".to_string(), |n| n.to_string_lossy().into_owned());
    name.push_str(".lock");
    config_path.with_file_name(name)
}

/// Acquires the exclusive advisory lock for a registry file.
///
/// # Errors
///
/// Returns [`ConfigError::Locked`] after the retry budget is exhausted,
/// or [`ConfigError::WriteError`] if the lock file cannot be created.
pub fn acquire(config_path: &Path) -> Result<ConfigLock, ConfigError> {
    let path = lock_path_for(config_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .map_err(|source| ConfigError::WriteError {
            path: path.clone(),
            source,
        })?;

    for attempt in 0..LOCK_ATTEMPTS {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(ConfigLock { file, path }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if attempt + 1 < LOCK_ATTEMPTS {
                    thread::sleep(LOCK_RETRY_DELAY);
                }
            }
            Err(source) => {
                return Err(ConfigError::WriteError { path, source });
            }
        }
    }

    Err(ConfigError::Locked { path })
}
