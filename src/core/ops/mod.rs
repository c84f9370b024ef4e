//! core::ops
//!
//! Operation coordination.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive per-repository lock registry (in-process mutex + `fs2` lock file)
//!
//! # Architecture
//!
//! Every mutating operation:
//! 1. Acquires the repository's guard from the registry
//! 2. Brings the local working copy to a clean state (discard + sync)
//! 3. Performs its toolchain steps
//! 4. Drops the guard on every exit path
//!
//! # Example
//!
//! ```ignore
//! use hostgit::core::ops::LockRegistry;
//!
//! let locks = LockRegistry::with_lock_files(paths);
//! let _guard = locks.acquire(&repo).await?;
//! // ... discard, sync, mutate, push ...
//! ```

pub mod lock;

pub use lock::{LockError, LockRegistry, RepoGuard};
