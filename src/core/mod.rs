//! core
//!
//! Core domain types, configuration, and coordination for hostgit.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName, RepoId, Signature
//! - [`treepath`] - Tree path cleaning and metadata-path detection
//! - [`paths`] - Centralized path routing for hostgit storage
//! - [`config`] - Configuration schema and loading
//! - [`ops`] - Per-repository locking
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Every on-disk location is computed in one place
//! - Schemas are strict and self-describing

pub mod config;
pub mod ops;
pub mod paths;
pub mod treepath;
pub mod types;
