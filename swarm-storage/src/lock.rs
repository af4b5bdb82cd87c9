//! Marker-file locks.
//!
//! Acquisition is an exclusive create of the marker file. A marker older
//! than `stale_after` is assumed to belong to a crashed holder and is
//! removed. After `max_retries` backoff rounds the marker is force-broken
//! once more, so a stuck holder delays callers but never blocks them.

use crate::fs::{ensure_dir, remove_if_exists};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use swarm_core::{LockConfig, LockMarker, LockOwner, LockState, SwarmError, SwarmResult};

/// A named cross-process lock backed by a marker file.
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    config: LockConfig,
    owner: LockOwner,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>, config: &LockConfig) -> Self {
        Self {
            path: path.into(),
            config: config.clone(),
            owner: LockOwner::current("swarm"),
        }
    }

    /// Label recorded in the marker for diagnostics.
    pub fn with_owner(mut self, label: &str) -> Self {
        self.owner = LockOwner::current(label);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn inspect(&self) -> LockState {
        inspect(&self.path)
    }

    /// Block until the lock is held. See the module docs for the retry
    /// policy.
    pub fn acquire(&self) -> SwarmResult<LockGuard> {
        let retries = self.config.max_retries;
        for attempt in 0..=retries {
            if self.try_acquire()? {
                return Ok(self.guard());
            }
            if attempt < retries {
                let wait = self.config.backoff_for(attempt);
                tracing::debug!(
                    lock = %self.path.display(),
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Lock busy, backing off"
                );
                std::thread::sleep(wait);
            }
        }

        tracing::warn!(
            lock = %self.path.display(),
            holder = ?self.inspect().owner(),
            attempts = retries + 1,
            "Lock retries exhausted, forcing"
        );
        remove_if_exists(&self.path)?;
        if self.try_create()? {
            return Ok(self.guard());
        }
        Err(SwarmError::LockTimeout {
            lock: self.path.display().to_string(),
            attempts: retries + 1,
        })
    }

    /// Run `f` while holding the lock. The marker is removed on every exit
    /// path, including a panic inside `f`.
    pub fn with_lock<T>(&self, f: impl FnOnce() -> SwarmResult<T>) -> SwarmResult<T> {
        let guard = self.acquire()?;
        let result = f();
        guard.release();
        result
    }

    /// Remove the marker. Releasing a free lock is a no-op.
    pub fn release(&self) {
        release_marker(&self.path);
    }

    /// One acquisition attempt, breaking a stale marker if there is one.
    fn try_acquire(&self) -> SwarmResult<bool> {
        if self.try_create()? {
            return Ok(true);
        }
        let state = self.inspect();
        if state.is_stale(Utc::now(), self.config.stale_after) {
            tracing::warn!(
                lock = %self.path.display(),
                holder = ?state.owner(),
                age_ms = state.age(Utc::now()).map(|a| a.as_millis() as u64),
                "Breaking stale lock"
            );
            remove_if_exists(&self.path)?;
            return self.try_create();
        }
        Ok(false)
    }

    /// Exclusive create of the marker. `false` when it already exists.
    fn try_create(&self) -> SwarmResult<bool> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(SwarmError::io(&self.path, e)),
        };
        let marker = LockMarker {
            owner: self.owner.clone(),
            acquired_at: swarm_core::now(),
        };
        // The marker body is diagnostic only; an empty marker still locks.
        if let Ok(body) = serde_json::to_vec(&marker) {
            let _ = file.write_all(&body);
        }
        Ok(true)
    }

    fn guard(&self) -> LockGuard {
        LockGuard {
            path: self.path.clone(),
            released: false,
        }
    }
}

/// Holds a lock until dropped or released.
#[derive(Debug)]
#[must_use = "the lock is released when the guard is dropped"]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            release_marker(&self.path);
            self.released = true;
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Read the state of a lock without touching it.
pub fn inspect(path: &Path) -> LockState {
    let Ok(meta) = fs::metadata(path) else {
        return LockState::Free;
    };
    let since = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    let owner = fs::read(path)
        .ok()
        .and_then(|body| serde_json::from_slice::<LockMarker>(&body).ok())
        .map(|marker| marker.owner);
    LockState::Held { owner, since }
}

fn release_marker(path: &Path) {
    if let Err(e) = remove_if_exists(path) {
        tracing::warn!(lock = %path.display(), error = %e, "Failed to release lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::{Duration, SystemTime};

    fn fast_config() -> LockConfig {
        LockConfig {
            max_retries: 200,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            stale_after: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("a.lock"), &fast_config()).with_owner("α");

        let guard = lock.acquire().unwrap();
        match lock.inspect() {
            LockState::Held { owner, .. } => assert_eq!(owner.map(|o| o.label), Some("α".to_string())),
            LockState::Free => panic!("expected held"),
        }
        guard.release();
        assert!(lock.inspect().is_free());

        // Idempotent.
        lock.release();
        lock.release();
    }

    #[test]
    fn test_guard_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("b.lock"), &fast_config());
        {
            let _guard = lock.acquire().unwrap();
            assert!(!lock.inspect().is_free());
        }
        assert!(lock.inspect().is_free());
    }

    #[test]
    fn test_with_lock_releases_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("c.lock"), &fast_config());
        let result: SwarmResult<()> = lock.with_lock(|| Err(SwarmError::invalid("x", "boom")));
        assert!(result.is_err());
        assert!(lock.inspect().is_free());
    }

    #[test]
    fn test_with_lock_releases_on_panic() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("d.lock"), &fast_config());
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = lock.with_lock(|| -> SwarmResult<()> { panic!("inside critical section") });
        }));
        assert!(outcome.is_err());
        assert!(lock.inspect().is_free());
    }

    #[test]
    fn test_stale_marker_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.lock");
        fs::write(&path, "12345").unwrap();
        let old = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let config = LockConfig {
            max_retries: 0,
            ..fast_config()
        };
        let lock = FileLock::new(&path, &config).with_owner("rescuer");
        let guard = lock.acquire().unwrap();
        assert_eq!(lock.inspect().owner().map(|o| o.label.as_str()), Some("rescuer"));
        drop(guard);
    }

    #[test]
    fn test_exhausted_retries_force_break() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stuck.lock");
        fs::write(&path, "").unwrap();
        let config = LockConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            stale_after: Duration::from_secs(3600),
        };
        let lock = FileLock::new(&path, &config);
        let guard = lock.acquire().unwrap();
        drop(guard);
        assert!(lock.inspect().is_free());
    }

    #[test]
    fn test_critical_sections_do_not_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.lock");
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let lock = FileLock::new(path, &fast_config());
                    barrier.wait();
                    for _ in 0..5 {
                        lock.with_lock(|| {
                            if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::sleep(Duration::from_millis(1));
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
