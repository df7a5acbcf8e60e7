// src/lib.rs

//! sysdescribe
//!
//! Builds a point-in-time description of a machine's filesystem by
//! reconciling what the package database claims to own with what exists
//! on disk.
//!
//! # Pipeline
//!
//! - `filesystem::mounts`: restrict the scan to local filesystems
//! - `reconcile`: changed package files (`rpm -Va`) and unmanaged files
//! - `filter`: user exclusions, applied the same way at every stage
//! - `extract`: one archive per unmanaged tree plus one for loose files
//!
//! Commands run through the `system::System` trait, so the same code works
//! on the local machine and on previously collected output.

pub mod compression;
pub mod config;
pub mod diagnostics;
mod error;
pub mod extract;
pub mod filesystem;
pub mod filter;
pub mod packages;
pub mod reconcile;
pub mod system;

pub use config::InspectConfig;
pub use diagnostics::{CollectingDiagnostics, Diagnostics, LogDiagnostics, SilentDiagnostics};
pub use error::{Error, Result};
pub use extract::{ExtractedTree, TreeExtractor};
pub use filesystem::{MountPoint, MountPoints};
pub use filter::{FilterRegistry, PathFilter};
pub use packages::{ChangeCategory, ChangeRecord, PackageId};
pub use reconcile::{ChangedFile, PackageFileReconciler, PackageOwnershipReport};
pub use system::{LocalSystem, ReplaySystem, System};
