// src/filesystem/path.rs

//! Mapping inspected paths into a description store
//!
//! Paths reported by the inspected system are absolute. Before one is used
//! to name a file inside a store it is made relative and checked for `..`
//! components, so `/opt/../../etc` can never point outside the store.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Turn an absolute inspected path into a relative, traversal-free path
///
/// ```
/// use sysdescribe::filesystem::path::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("/foo/bar").unwrap(), PathBuf::from("foo/bar"));
/// assert_eq!(sanitize_path("/opt/./x/").unwrap(), PathBuf::from("opt/x"));
/// assert!(sanitize_path("/opt/../../etc").is_err());
/// assert!(sanitize_path("/").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(Error::InvalidPath(format!(
                    "Path {} contains a parent directory component",
                    path.display()
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!(
            "Path {} has no components",
            path.display()
        )));
    }

    Ok(normalized)
}

/// Location of a tree archive relative to the store
///
/// The tree's parent directory is mirrored below `trees/`, the archive is
/// named after the tree: `/foo/bar` becomes `trees/foo/bar.<extension>`.
pub fn tree_archive_path(tree: &str, extension: &str) -> Result<PathBuf> {
    let relative = sanitize_path(tree)?;
    let name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidPath(format!("Tree {} has no name", tree)))?;

    let mut archive = PathBuf::from("trees");
    if let Some(parent) = relative.parent() {
        archive.push(parent);
    }
    archive.push(format!("{}.{}", name, extension));
    Ok(archive)
}

/// Resolve an inspected path below the root the inspected system is mounted at
pub fn under_root(root: &Path, path: &str) -> Result<PathBuf> {
    if path.trim_matches('/').is_empty() {
        return Ok(root.to_path_buf());
    }
    Ok(root.join(sanitize_path(path)?))
}
