// src/filter/mod.rs

//! Path filters
//!
//! Filters remove values from inspection results. Each filter belongs to a
//! scope path naming the result field it applies to, e.g.
//! `/unmanaged_files/files/name`. The same registry is consulted by every
//! scan stage, so an excluded directory is neither listed nor archived.

pub mod definition;
pub mod element;
pub mod options;
pub mod registry;

pub use definition::{parse_definition, Clause};
pub use element::{Matcher, PathFilter, WILDCARD};
pub use options::{
    build_filter, CHANGED_CONFIG_FILES_CHANGES_SCOPE, CHANGED_CONFIG_FILES_SCOPE,
    CHANGED_MANAGED_FILES_CHANGES_SCOPE, CHANGED_MANAGED_FILES_SCOPE, UNMANAGED_FILES_SCOPE,
};
pub use registry::FilterRegistry;
