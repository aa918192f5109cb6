//! Cross-process mutual exclusion through a lock file
//!
//! Holding the lock means having created the lock file. Creation uses `create_new`, so
//! two processes polling the same path can never both succeed.
//!
//! ```rust,no_run
//! use basictools::lock::FileLock;
//!
//! let lock = FileLock::new("./data.lck").with_process_name("trainer");
//! let guard = lock.acquire()?;
//! // ... read and rewrite the shared file ...
//! guard.release()?;
//! # Ok::<(), basictools::lock::LockError>(())
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const DEFAULT_LOCK_PATH: &str = "./lock.lck";
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_millis(100);
pub const DEFAULT_PROCESS_NAME: &str = "process";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("timed out after {waited:?} waiting for lock {path}")]
    Timeout { path: PathBuf, waited: Duration },
}

#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    /// Pause between two attempts while the lock is held elsewhere
    wait_time: Duration,
    /// Written into the lock file to identify the holder
    process_name: String,
}

impl Default for FileLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_PATH)
    }
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wait_time: DEFAULT_WAIT_TIME,
            process_name: DEFAULT_PROCESS_NAME.to_string(),
        }
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_process_name(mut self, process_name: impl Into<String>) -> Self {
        self.process_name = process_name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether some holder currently owns the lock file
    pub fn is_locked(&self) -> bool {
        self.path.exists()
    }

    /// One attempt; `Ok(None)` when the lock is held elsewhere
    pub fn try_acquire(&self) -> Result<Option<FileLockGuard>, LockError> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(source) => {
                return Err(LockError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let guard = FileLockGuard {
            path: self.path.clone(),
            released: false,
        };

        let acquired_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        write!(
            file,
            "Process: {}\nLock acquired at time {}",
            self.process_name, acquired_at
        )
        .map_err(|source| LockError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!("Acquired lock {}", self.path.display());
        Ok(Some(guard))
    }

    /// Block until the lock is ours
    pub fn acquire(&self) -> Result<FileLockGuard, LockError> {
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            thread::sleep(self.wait_time);
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<FileLockGuard, LockError> {
        let start = Instant::now();
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(LockError::Timeout {
                    path: self.path.clone(),
                    waited,
                });
            }
            thread::sleep(self.wait_time.min(timeout - waited));
        }
    }
}

/// Proof of holding a [`FileLock`]; the lock file is removed on release or drop
#[derive(Debug)]
pub struct FileLockGuard {
    path: PathBuf,
    released: bool,
}

impl FileLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<(), LockError> {
        self.remove()
    }

    fn remove(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Released lock {}", self.path.display());
                Ok(())
            }
            // Someone cleaned it up already
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LockError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            tracing::warn!("Failed to release lock: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_acquire_writes_holder_and_release_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("job.lck")).with_process_name("trainer");

        let guard = lock.acquire().unwrap();
        assert!(lock.is_locked());
        let contents = fs::read_to_string(lock.path()).unwrap();
        assert!(contents.starts_with("Process: trainer\nLock acquired at time "));

        guard.release().unwrap();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_try_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("job.lck"));

        let held = lock.try_acquire().unwrap().unwrap();
        assert!(lock.try_acquire().unwrap().is_none());

        drop(held);
        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_acquire_timeout_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("job.lck")).with_wait_time(Duration::from_millis(5));

        let _held = lock.acquire().unwrap();
        let err = lock.acquire_timeout(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn test_missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("missing").join("job.lck"));
        assert!(matches!(lock.try_acquire(), Err(LockError::Io { .. })));
    }

    #[test]
    fn test_lock_serializes_threads() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("shared.lck")).with_wait_time(Duration::from_millis(1));
        let inside = Arc::new(Mutex::new(0usize));
        let max_inside = Arc::new(Mutex::new(0usize));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                thread::spawn(move || {
                    let _guard = lock.acquire().unwrap();
                    let now = {
                        let mut count = inside.lock().unwrap();
                        *count += 1;
                        *count
                    };
                    {
                        let mut max = max_inside.lock().unwrap();
                        *max = (*max).max(now);
                    }
                    thread::sleep(Duration::from_millis(5));
                    *inside.lock().unwrap() -= 1;
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*max_inside.lock().unwrap(), 1);
    }
}
