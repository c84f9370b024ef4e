//! core::ops::lock
//!
//! Exclusive per-repository lock for mutating operations.
//!
//! # Architecture
//!
//! The lock has two layers, always taken in this order:
//!
//! 1. An async mutex per repository identity (`owner/name`), shared by every
//!    task in this process through the registry.
//! 2. An OS-level exclusive lock (`fs2`) on `<local>/locks/<owner>/<name>.lock`,
//!    shared with every other `hostgit` process on the host.
//!
//! Every operation that writes to a repository's local working copy, its
//! patch directory, or pushes into it, holds the guard for its whole
//! duration. Granularity is the repository, never the branch: an edit and a
//! merge on the same repository cannot overlap.
//!
//! A registry built with [`LockRegistry::new`] has no file layer. It is only
//! suitable when a single process owns the storage, as in unit tests.
//!
//! # Invariants
//!
//! - Lock is released on every exit path when the guard drops (RAII pattern)
//! - Acquisition blocks until the holder releases; there is no timeout
//! - Not reentrant: acquiring the same key twice from one task deadlocks
//! - Waiters in one process are served in FIFO order (tokio mutex fairness)
//! - A registry entry lives only while some task holds or awaits it
//!
//! # Example
//!
//! ```
//! use hostgit::core::ops::lock::LockRegistry;
//! use hostgit::core::types::RepoId;
//!
//! # tokio_test::block_on(async {
//! let locks = LockRegistry::new();
//! let repo = RepoId::new("alice", "notes").unwrap();
//!
//! let guard = locks.acquire(&repo).await.unwrap();
//! assert!(locks.is_locked(&repo));
//!
//! // Lock automatically released when dropped
//! drop(guard);
//! assert!(!locks.is_locked(&repo));
//! # });
//! ```

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fs2::FileExt;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::core::paths::HostPaths;
use crate::core::types::RepoId;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Failed to create the lock file or its directory.
    #[error("failed to create lock file {}: {source}", path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to take the OS lock.
    #[error("failed to lock {}: {source}", path.display())]
    Acquire {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The blocking lock task did not complete.
    #[error("lock task for {} was interrupted", path.display())]
    Interrupted { path: PathBuf },
}

type Slots = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Registry of per-repository locks.
///
/// Cloning is cheap and clones share the same set of locks.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    slots: Slots,
    paths: Option<HostPaths>,
}

/// Proof that the holder has exclusive access to one repository.
///
/// The lock is released when this guard is dropped.
#[derive(Debug)]
pub struct RepoGuard {
    key: String,
    file: Option<File>,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
}

impl RepoGuard {
    /// The repository key this guard protects.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this guard also holds the cross-process file lock.
    pub fn holds_file_lock(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for RepoGuard {
    fn drop(&mut self) {
        // File first, then the in-process mutex, so the next local waiter
        // never races the closing descriptor.
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
        drop(self.guard.take());

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
        debug!(key = %self.key, "repository lock released");
    }
}

impl LockRegistry {
    /// An in-process registry without the file layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that also takes the cross-process lock file of each
    /// repository under `paths`.
    pub fn with_lock_files(paths: HostPaths) -> Self {
        Self {
            slots: Slots::default(),
            paths: Some(paths),
        }
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        // A poisoned map only means another thread panicked while inserting;
        // the map itself is still consistent.
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    fn guard(&self, key: String, guard: OwnedMutexGuard<()>, file: Option<File>) -> RepoGuard {
        RepoGuard {
            key,
            file,
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Wait until the repository is free, then take it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or locked.
    pub async fn acquire(&self, repo: &RepoId) -> Result<RepoGuard, LockError> {
        let key = repo.key();
        debug!(key = %key, "waiting for repository lock");
        let guard = self.slot(&key).lock_owned().await;
        // Built before the file step so a failure still releases the slot.
        let mut held = self.guard(key, guard, None);

        if let Some(paths) = &self.paths {
            let path = paths.lock_path(repo);
            let task_path = path.clone();
            let file = tokio::task::spawn_blocking(move || lock_file(&task_path))
                .await
                .map_err(|_| LockError::Interrupted { path })??;
            held.file = Some(file);
        }
        debug!(key = %held.key, "repository lock acquired");
        Ok(held)
    }

    /// Take the repository only if nobody, in this process or another, holds
    /// it right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or locked for a
    /// reason other than contention.
    pub fn try_acquire(&self, repo: &RepoId) -> Result<Option<RepoGuard>, LockError> {
        let key = repo.key();
        let Ok(guard) = self.slot(&key).try_lock_owned() else {
            return Ok(None);
        };
        let mut held = self.guard(key, guard, None);
        if let Some(paths) = &self.paths {
            match try_lock_file(&paths.lock_path(repo))? {
                Some(file) => held.file = Some(file),
                None => return Ok(None),
            }
        }
        debug!(key = %held.key, "repository lock acquired");
        Ok(Some(held))
    }

    /// Whether some task in this process currently holds the repository.
    pub fn is_locked(&self, repo: &RepoId) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&repo.key())
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Number of repositories with a live registry entry.
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    let create = |source| LockError::Create {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(create)?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(create)
}

fn lock_file(path: &Path) -> Result<File, LockError> {
    let file = open_lock_file(path)?;
    file.lock_exclusive().map_err(|source| LockError::Acquire {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file)
}

fn try_lock_file(path: &Path) -> Result<Option<File>, LockError> {
    let file = open_lock_file(path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
        Err(source) => Err(LockError::Acquire {
            path: path.to_path_buf(),
            source,
        }),
    }
}
