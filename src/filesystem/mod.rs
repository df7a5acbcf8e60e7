// src/filesystem/mod.rs

//! Filesystem side of an inspection
//!
//! - mount table parsing and classification
//! - mapping inspected paths into description stores
//! - per-scope file stores holding extracted archives

pub mod mounts;
pub mod path;
pub mod store;

pub use mounts::{FsClass, FsClassifier, MountPoint, MountPoints};
pub use store::ScopeFileStore;
