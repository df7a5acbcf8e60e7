// src/reconcile/mod.rs

//! Reconciling the package database against the filesystem
//!
//! `PackageFileReconciler` answers two questions about an inspected system:
//!
//! - which package files differ from what their package recorded
//!   (`changed_files`, decoded from `rpm -Va`)
//! - which files no package owns at all (`unmanaged_files`, see
//!   [`unmanaged`])
//!
//! The verification pass is expensive and runs at most once per reconciler.

pub mod unmanaged;

use std::collections::HashSet;
use std::sync::OnceLock;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::InspectConfig;
use crate::diagnostics::{Diagnostics, pluralize};
use crate::error::Result;
use crate::filter::{
    CHANGED_CONFIG_FILES_CHANGES_SCOPE, CHANGED_CONFIG_FILES_SCOPE,
    CHANGED_MANAGED_FILES_CHANGES_SCOPE, CHANGED_MANAGED_FILES_SCOPE, FilterRegistry,
};
use crate::packages::{
    ChangeRecord, FileAttributes, PackageId, decode_line, is_record_line, query_owner, stat,
};
use crate::system::System;

pub use unmanaged::{UnmanagedEntry, UnmanagedFilesReport, UnmanagedKind};

/// Arguments of the verification pass
pub const VERIFY_ARGS: &[&str] = &["-Va", "--nodeps", "--nodigest", "--nosignature", "--noscripts"];

/// Tools that must exist on the inspected system
const REQUIREMENTS: &[&str] = &["rpm", "stat", "find"];

/// A changed package file with its owner and current attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    #[serde(flatten)]
    pub record: ChangeRecord,
    pub package: Option<PackageId>,
    /// `None` for deleted files
    #[serde(flatten)]
    pub attributes: Option<FileAttributes>,
}

impl ChangedFile {
    pub fn path(&self) -> &str {
        &self.record.path
    }

    pub fn change_names(&self) -> Vec<&str> {
        self.record.change_names()
    }
}

/// Result of the verification pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageOwnershipReport {
    pub changed: Vec<ChangedFile>,
    /// Whether the report came from an earlier pass of the same reconciler
    pub cached: bool,
}

/// Package database reconciliation for one inspected system
pub struct PackageFileReconciler<'a> {
    system: &'a dyn System,
    diagnostics: &'a dyn Diagnostics,
    config: InspectConfig,
    changed: OnceLock<Vec<ChangedFile>>,
}

impl<'a> PackageFileReconciler<'a> {
    pub fn new(
        system: &'a dyn System,
        diagnostics: &'a dyn Diagnostics,
        config: InspectConfig,
    ) -> Self {
        Self {
            system,
            diagnostics,
            config,
            changed: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &InspectConfig {
        &self.config
    }

    /// Make sure the package query, stat and find tools are available
    ///
    /// The first missing tool is reported by name.
    pub fn check_requirements(&self) -> Result<()> {
        for program in REQUIREMENTS {
            self.system.check_requirement(&[*program], &["--version"])?;
        }
        Ok(())
    }

    /// Every package file that differs from its package
    ///
    /// The verification command runs on the first call only. Later calls
    /// return the same records, without checking requirements again.
    pub fn changed_files(&self) -> Result<PackageOwnershipReport> {
        if let Some(changed) = self.changed.get() {
            return Ok(PackageOwnershipReport {
                changed: changed.clone(),
                cached: true,
            });
        }

        self.check_requirements()?;
        let changed = self.verify()?;
        let changed = self.changed.get_or_init(|| changed).clone();
        Ok(PackageOwnershipReport {
            changed,
            cached: false,
        })
    }

    /// Changed files that are not config files, sorted by path
    ///
    /// Files are filtered by name and by their exact set of changes.
    pub fn changed_managed_files(&self, filter: &FilterRegistry) -> Result<Vec<ChangedFile>> {
        self.select(
            filter,
            [CHANGED_MANAGED_FILES_SCOPE, CHANGED_MANAGED_FILES_CHANGES_SCOPE],
            |f| !f.record.is_config(),
        )
    }

    /// Changed config files, sorted by path
    pub fn changed_config_files(&self, filter: &FilterRegistry) -> Result<Vec<ChangedFile>> {
        self.select(
            filter,
            [CHANGED_CONFIG_FILES_SCOPE, CHANGED_CONFIG_FILES_CHANGES_SCOPE],
            |f| f.record.is_config(),
        )
    }

    /// Package owning `path`, `None` when no package does
    pub fn package_for_file_path(&self, path: &str) -> Result<Option<PackageId>> {
        query_owner(self.system, path)
    }

    fn select(
        &self,
        filter: &FilterRegistry,
        [name_scope, changes_scope]: [&str; 2],
        keep: impl Fn(&ChangedFile) -> bool,
    ) -> Result<Vec<ChangedFile>> {
        let mut files: Vec<ChangedFile> = self
            .changed_files()?
            .changed
            .into_iter()
            .filter(|f| keep(f))
            .collect();
        filter.reject(name_scope, &mut files, ChangedFile::path);
        filter.reject_sets(changes_scope, &mut files, ChangedFile::change_names, self.diagnostics);
        files.sort_by(|a, b| a.record.path.cmp(&b.record.path));
        Ok(files)
    }

    fn verify(&self) -> Result<Vec<ChangedFile>> {
        let output = self
            .system
            .run_command("rpm", VERIFY_ARGS)?
            .accept_status("rpm -Va", &[0, 1])?;

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for line in output.stdout_lossy().lines() {
            if !is_record_line(line) || !seen.insert(line.to_string()) {
                continue;
            }
            records.push(decode_line(line, self.diagnostics)?);
        }
        self.diagnostics.progress(&format!(
            "Found {}",
            pluralize(records.len(), "changed file", "changed files")
        ));

        let existing: Vec<String> = records
            .iter()
            .filter(|r| !r.is_deleted())
            .map(|r| r.path.clone())
            .collect();
        let mut attributes =
            stat::query_attributes(self.system, &existing, self.config.scan.stat_batch_limit)?;

        let mut changed = Vec::with_capacity(records.len());
        for record in records {
            let package = query_owner(self.system, &record.path)?;
            if package.is_none() {
                debug!("Changed file {} has no owning package", record.path);
            }
            let attributes = attributes.remove(&record.path);
            changed.push(ChangedFile {
                record,
                package,
                attributes,
            });
        }

        info!("Verification found {} changed package files", changed.len());
        Ok(changed)
    }
}
