// src/packages/mod.rs

//! Package database access
//!
//! Parsers for the output of the package manager's query and verification
//! commands, and thin wrappers that run those commands through a `System`.

pub mod manifest;
pub mod query;
pub mod stat;
pub mod verify;

pub use manifest::PackageManifest;
pub use query::{PackageId, parse_package_token, query_owner};
pub use stat::{FileAttributes, FileKind};
pub use verify::{ChangeCategory, ChangeRecord, decode_line, is_record_line};
