// src/extract/mod.rs

//! Archiving discovered files and trees into a description store
//!
//! Loose files go into a single `files.<ext>` archive. Every tree gets its
//! own archive below `trees/`, mirroring the tree's location:
//!
//! ```text
//! <store>/files.tgz
//! <store>/trees/opt.tgz
//! <store>/trees/foo/bar.tgz
//! ```
//!
//! Trees are independent of each other and are written in parallel.

pub mod archive;

use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::compression::CompressionFormat;
use crate::diagnostics::{Diagnostics, pluralize};
use crate::error::Result;
use crate::filesystem::path::tree_archive_path;
use crate::filesystem::store::ScopeFileStore;

pub use archive::{ArchiveEntry, EntryKind, Exclusions, list_archive, write_archive};

/// Archive name of the loose files, without extension
pub const FILES_ARCHIVE: &str = "files";

/// One written archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedTree {
    /// Tree path on the inspected system; `None` for the loose files archive
    pub root_path: Option<String>,
    pub archive_location: PathBuf,
}

/// Writes archives of inspected paths into one store
pub struct TreeExtractor<'a> {
    root: PathBuf,
    store: &'a ScopeFileStore,
    format: CompressionFormat,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> TreeExtractor<'a> {
    /// Read inspected paths below `root` and write into `store`
    pub fn new(
        root: impl Into<PathBuf>,
        store: &'a ScopeFileStore,
        format: CompressionFormat,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            root: root.into(),
            store,
            format,
            diagnostics,
        }
    }

    pub fn files_archive(&self) -> PathBuf {
        self.store
            .location()
            .join(format!("{}.{}", FILES_ARCHIVE, self.format.archive_extension()))
    }

    /// Write all `paths` into the loose files archive
    pub fn extract_files(&self, paths: &[String], excluded: &[String]) -> Result<ExtractedTree> {
        let exclusions = Exclusions::new(excluded)?;
        self.store.create()?;

        let destination = self.files_archive();
        self.diagnostics.progress(&format!(
            "Extracting {}",
            pluralize(paths.len(), "file", "files")
        ));
        write_archive(&self.root, paths, &exclusions, &destination, self.format)?;

        Ok(ExtractedTree {
            root_path: None,
            archive_location: destination,
        })
    }

    /// Write one archive per tree
    ///
    /// Every tree is attempted. The first failure is returned after all
    /// trees are done; archives of the other trees are kept.
    pub fn extract_trees(&self, trees: &[String], excluded: &[String]) -> Result<Vec<ExtractedTree>> {
        let results = self.extract_trees_each(trees, excluded)?;
        let mut extracted = Vec::with_capacity(results.len());
        let mut first_error = None;

        for result in results {
            match result {
                Ok(tree) => extracted.push(tree),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => debug!("Additional tree extraction failure: {}", e),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(extracted),
        }
    }

    /// Write one archive per tree, reporting each tree's outcome
    pub fn extract_trees_each(
        &self,
        trees: &[String],
        excluded: &[String],
    ) -> Result<Vec<Result<ExtractedTree>>> {
        let exclusions = Exclusions::new(excluded)?;
        self.store.create()?;

        info!(
            "Extracting {} into {}",
            pluralize(trees.len(), "tree", "trees"),
            self.store.location().display()
        );

        Ok(trees
            .par_iter()
            .map(|tree| self.extract_tree(tree, &exclusions))
            .collect())
    }

    fn extract_tree(&self, tree: &str, exclusions: &Exclusions) -> Result<ExtractedTree> {
        let relative = tree_archive_path(tree, self.format.archive_extension())?;
        if let Some(parent) = relative.parent() {
            self.store.create_sub_directory(parent)?;
        }
        let destination = self.store.location().join(&relative);

        write_archive(
            &self.root,
            &[tree.to_string()],
            exclusions,
            &destination,
            self.format,
        )
        .inspect_err(|e| {
            self.diagnostics
                .warn(&format!("Extraction of tree '{}' failed: {}", tree, e));
        })?;

        self.diagnostics.progress(&format!("Extracted {}", tree));
        Ok(ExtractedTree {
            root_path: Some(tree.to_string()),
            archive_location: destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir) {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("opt/app")).unwrap();
        fs::write(root.path().join("opt/app/bin"), b"x").unwrap();
        fs::create_dir_all(root.path().join("foo/bar/baz")).unwrap();
        fs::write(root.path().join("foo/bar/baz/data"), b"y").unwrap();
        fs::create_dir_all(root.path().join("etc")).unwrap();
        fs::write(root.path().join("etc/unmanaged.conf"), b"z").unwrap();
        (root, TempDir::new().unwrap())
    }

    #[test]
    fn test_extract_trees_layout() {
        let (root, description) = setup();
        let store = ScopeFileStore::new(description.path(), "unmanaged_files");
        let diagnostics = CollectingDiagnostics::new();
        let extractor =
            TreeExtractor::new(root.path(), &store, CompressionFormat::Gzip, &diagnostics);

        let trees = extractor
            .extract_trees(&["/opt".to_string(), "/foo/bar".to_string()], &[])
            .unwrap();

        let locations: Vec<PathBuf> = trees.iter().map(|t| t.archive_location.clone()).collect();
        assert_eq!(
            locations,
            vec![
                store.location().join("trees/opt.tgz"),
                store.location().join("trees/foo/bar.tgz"),
            ]
        );
        assert!(store.location().join("trees/foo").is_dir());

        let entries = list_archive(&locations[1]).unwrap();
        assert!(entries.iter().any(|e| e.path == "/foo/bar/baz/data"));
        assert!(entries.iter().all(|e| e.path.starts_with("/foo/bar")));
    }

    #[test]
    fn test_extract_files() {
        let (root, description) = setup();
        let store = ScopeFileStore::new(description.path(), "unmanaged_files");
        let diagnostics = CollectingDiagnostics::new();
        let extractor =
            TreeExtractor::new(root.path(), &store, CompressionFormat::Gzip, &diagnostics);

        let files = extractor
            .extract_files(&["/etc/unmanaged.conf".to_string()], &[])
            .unwrap();
        assert_eq!(files.root_path, None);
        assert_eq!(files.archive_location, store.location().join("files.tgz"));
        assert_eq!(diagnostics.progress_messages(), vec!["Extracting 1 file"]);
    }

    #[test]
    fn test_failed_tree_does_not_affect_siblings() {
        let (root, description) = setup();
        let store = ScopeFileStore::new(description.path(), "unmanaged_files");
        let diagnostics = CollectingDiagnostics::new();
        let extractor =
            TreeExtractor::new(root.path(), &store, CompressionFormat::Gzip, &diagnostics);

        let trees = ["/opt".to_string(), "/missing".to_string()];
        let results = extractor.extract_trees_each(&trees, &[]).unwrap();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(store.location().join("trees/opt.tgz").exists());
        assert!(!store.location().join("trees/missing.tgz").exists());
        assert_eq!(diagnostics.warnings().len(), 1);

        assert!(extractor.extract_trees(&trees, &[]).is_err());
    }

    #[test]
    fn test_rerun_overwrites() {
        let (root, description) = setup();
        let store = ScopeFileStore::new(description.path(), "unmanaged_files");
        let diagnostics = CollectingDiagnostics::new();
        let extractor =
            TreeExtractor::new(root.path(), &store, CompressionFormat::Gzip, &diagnostics);

        extractor.extract_trees(&["/opt".to_string()], &[]).unwrap();
        fs::write(root.path().join("opt/app/new"), b"n").unwrap();
        extractor.extract_trees(&["/opt".to_string()], &[]).unwrap();

        let entries = list_archive(&store.location().join("trees/opt.tgz")).unwrap();
        assert!(entries.iter().any(|e| e.path == "/opt/app/new"));
    }

    #[test]
    fn test_excluded_tree_content() {
        let (root, description) = setup();
        let store = ScopeFileStore::new(description.path(), "unmanaged_files");
        let diagnostics = CollectingDiagnostics::new();
        let extractor =
            TreeExtractor::new(root.path(), &store, CompressionFormat::Gzip, &diagnostics);

        extractor
            .extract_trees(&["/foo/bar".to_string()], &["/foo/bar/baz/*".to_string()])
            .unwrap();
        let entries = list_archive(&store.location().join("trees/foo/bar.tgz")).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/foo/bar", "/foo/bar/baz"]);
    }

    #[test]
    fn test_invalid_tree_path() {
        let (root, description) = setup();
        let store = ScopeFileStore::new(description.path(), "unmanaged_files");
        let diagnostics = CollectingDiagnostics::new();
        let extractor =
            TreeExtractor::new(root.path(), &store, CompressionFormat::Gzip, &diagnostics);

        let err = extractor.extract_trees(&["/opt/../..".to_string()], &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
    }
}
