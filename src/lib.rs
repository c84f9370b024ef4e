//! hostgit - Git mutation and merge orchestration for a repository host
//!
//! hostgit sits between a Git hosting service and the Git toolchain. It
//! performs every repository mutation the host offers through its web
//! surface (file edits, uploads, branch creation, pull-request merges),
//! computes pull-request metadata, tests mergeability, and enforces
//! protected branches at push time.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Orchestration operations behind a per-repository lock
//! - [`policy`] - Protected-branch storage and hook script generation
//! - [`hook`] - The push-time hook process
//! - [`core`] - Domain types, configuration, paths and the lock registry
//! - [`git`] - Read-side Git access and the toolchain capability
//!
//! # Correctness Invariants
//!
//! 1. At most one mutation of a repository's local copy runs at a time
//! 2. The bare repository only changes through a push
//! 3. Paths inside repository metadata are never written
//! 4. Protected branches are never deleted or force-pushed

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod hook;
pub mod policy;
