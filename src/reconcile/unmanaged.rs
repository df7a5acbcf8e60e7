// src/reconcile/unmanaged.rs

//! Discovery of files no package owns
//!
//! The filesystem is walked breadth first with `find`, a few levels per
//! call. Every directory the package manifest does not know is reported as
//! a tree without listing its content; every file or link it does not know
//! is reported individually. Directories the manifest knows and whose
//! content was cut off by the depth limit are walked next.
//!
//! Remote and special mounts are never descended into. Remote mount
//! points are reported as `remote_dir` entries.

use std::collections::{BTreeMap, HashMap, VecDeque};

use glob::Pattern;
use serde::Serialize;
use tracing::{debug, info};

use super::PackageFileReconciler;
use crate::diagnostics::pluralize;
use crate::error::Result;
use crate::extract::{EntryKind, ExtractedTree, TreeExtractor, list_archive};
use crate::filesystem::{MountPoints, ScopeFileStore};
use crate::filter::{FilterRegistry, PathFilter, UNMANAGED_FILES_SCOPE, WILDCARD};
use crate::packages::PackageManifest;

/// Name of the scope store below the description directory
pub const STORE_NAME: &str = "unmanaged_files";

/// Store used while extraction is in progress
pub const TMP_STORE_NAME: &str = "unmanaged_files.tmp";

/// Type of an unmanaged entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmanagedKind {
    File,
    Link,
    Dir,
    RemoteDir,
}

/// One unmanaged file, link, tree or remote mount point
///
/// Trees and remote directories carry a trailing `/` in their name.
/// Metadata is only known after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmanagedEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: UnmanagedKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Number of archive members of a tree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<usize>,
}

impl UnmanagedEntry {
    pub fn new(name: impl Into<String>, kind: UnmanagedKind) -> Self {
        Self {
            name: name.into(),
            kind,
            user: None,
            group: None,
            mode: None,
            size: None,
            files: None,
        }
    }

    /// Path on the inspected system, without the trailing `/` of trees
    pub fn path(&self) -> &str {
        match self.kind {
            UnmanagedKind::Dir | UnmanagedKind::RemoteDir => {
                self.name.strip_suffix('/').unwrap_or(&self.name)
            }
            _ => &self.name,
        }
    }
}

/// Result of an unmanaged files scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmanagedFilesReport {
    pub extracted: bool,
    /// Sorted by name
    pub files: Vec<UnmanagedEntry>,
}

impl UnmanagedFilesReport {
    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} unmanaged files and trees.",
            if self.extracted { "Extracted" } else { "Found" },
            self.count()
        )
    }
}

/// One record of `find -printf '%y\0%P\0%l\0'`
#[derive(Debug, Clone, PartialEq, Eq)]
struct FindEntry {
    kind: char,
    path: String,
    link: String,
}

/// Outcome of the filesystem walk
#[derive(Debug, Default)]
struct ScanResult {
    files: Vec<String>,
    links: Vec<String>,
    trees: Vec<String>,
}

impl PackageFileReconciler<'_> {
    /// Find all unmanaged files, optionally archiving them into the store
    pub fn unmanaged_files(&self, filter: &FilterRegistry, extract: bool) -> Result<UnmanagedFilesReport> {
        self.check_requirements()?;

        let mounts = MountPoints::load(self.system, &self.config.mounts.classifier())?;
        let manifest = PackageManifest::load(self.system)?;
        let file_filter = self.unmanaged_filter(filter);

        let remote_dirs: Vec<String> = mounts
            .remote()
            .into_iter()
            .filter(|dir| !file_filter.matches(dir))
            .collect();
        let special_dirs = mounts.special();
        for (label, dirs) in [("remote", &remote_dirs), ("special", &special_dirs)] {
            if !dirs.is_empty() {
                debug!("Ignoring content of {} directories: {}", label, dirs.join(", "));
            }
        }

        let scan = self.scan(&mounts, &manifest, &file_filter)?;

        let final_store = ScopeFileStore::new(&self.config.store_path, STORE_NAME);
        let mut entries: Vec<UnmanagedEntry> = scan
            .files
            .iter()
            .map(|f| UnmanagedEntry::new(f.clone(), UnmanagedKind::File))
            .chain(scan.links.iter().map(|l| UnmanagedEntry::new(l.clone(), UnmanagedKind::Link)))
            .chain(scan.trees.iter().map(|t| UnmanagedEntry::new(format!("{}/", t), UnmanagedKind::Dir)))
            .collect();

        if extract {
            let mut excluded: Vec<String> = mounts
                .remote()
                .iter()
                .chain(special_dirs.iter())
                .map(|dir| Pattern::escape(dir))
                .collect();
            excluded.extend(file_filter.values().iter().map(|v| matcher_pattern(v)));
            self.extract(&scan, &excluded, &mut entries)?;
        } else {
            final_store.remove()?;
        }

        entries.extend(
            remote_dirs
                .iter()
                .map(|dir| UnmanagedEntry::new(format!("{}/", dir), UnmanagedKind::RemoteDir)),
        );
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let report = UnmanagedFilesReport {
            extracted: extract,
            files: entries,
        };
        info!("{}", report.summary());
        Ok(report)
    }

    /// The user's name filter plus the description store, each matcher
    /// also excluding everything below it
    fn unmanaged_filter(&self, filter: &FilterRegistry) -> PathFilter {
        let mut file_filter = filter
            .filter_for(UNMANAGED_FILES_SCOPE)
            .cloned()
            .unwrap_or_else(|| PathFilter::new(UNMANAGED_FILES_SCOPE));
        file_filter.add_matcher(self.config.store_path.display().to_string());
        file_filter.add_recursive_matchers();
        file_filter
    }

    fn scan(
        &self,
        mounts: &MountPoints,
        manifest: &PackageManifest,
        file_filter: &PathFilter,
    ) -> Result<ScanResult> {
        let local_mounts = mounts.persistent();
        let remote = mounts.remote();
        let special = mounts.special();
        let start_depth = self.config.scan.start_depth;
        let max_depth = self.config.scan.max_depth;

        let mut result = ScanResult::default();
        let mut todo = VecDeque::from([String::from("/")]);
        let mut find_count = 0;

        while let Some(find_dir) = todo.pop_front() {
            let depth = if local_mounts.contains(&find_dir) {
                start_depth
            } else {
                max_depth
            };
            let listing = self.find_entries(&find_dir, depth)?;
            find_count += 1;

            let prefix = if find_dir == "/" {
                String::from("/")
            } else {
                format!("{}/", find_dir)
            };

            // directory -> whether find may have cut off its content
            let mut dirs: BTreeMap<String, bool> = BTreeMap::new();
            let mut files: Vec<(String, bool)> = Vec::new();
            for entry in listing {
                let path = format!("{}{}", prefix, entry.path);
                if file_filter.matches(&path) {
                    continue;
                }
                match entry.kind {
                    'd' => {
                        let cut_off = entry.path.matches('/').count() + 1 == depth;
                        dirs.insert(path, cut_off);
                    }
                    'f' => files.push((path, false)),
                    'l' => files.push((path, !entry.link.is_empty())),
                    _ => {}
                }
            }

            // find does not cross into other filesystems
            for mount in &local_mounts {
                if let Some(cut_off) = dirs.get_mut(mount) {
                    *cut_off = true;
                }
            }

            let mut new_trees: Vec<String> = Vec::new();
            for (dir, cut_off) in &dirs {
                if special.contains(dir) || remote.contains(dir) {
                    continue;
                }
                if new_trees.iter().any(|tree| is_below(dir, tree)) {
                    continue;
                }
                if manifest.is_managed_dir(dir) {
                    if *cut_off {
                        todo.push_back(dir.clone());
                    }
                } else {
                    new_trees.push(dir.clone());
                }
            }

            for (file, is_link) in files {
                if manifest.is_managed_file(&file)
                    || new_trees.iter().any(|tree| is_below(&file, tree))
                {
                    continue;
                }
                if is_link {
                    result.links.push(file);
                } else {
                    result.files.push(file);
                }
            }
            result.trees.extend(new_trees);

            let count = result.files.len() + result.links.len() + result.trees.len();
            self.diagnostics.progress(&format!(
                "Found {}...",
                pluralize(count, "file or tree", "files and trees")
            ));
        }

        debug!(
            "Unmanaged files scan: {} find calls, {} files, {} links, {} trees",
            find_count,
            result.files.len(),
            result.links.len(),
            result.trees.len()
        );
        Ok(result)
    }

    /// List `dir` down to `depth` levels
    ///
    /// A failing find still yields what it printed; the failure becomes a
    /// warning.
    fn find_entries(&self, dir: &str, depth: usize) -> Result<Vec<FindEntry>> {
        let depth = depth.to_string();
        let output = self.system.run_command(
            "find",
            &[dir, "-xdev", "-maxdepth", &depth, "-printf", "%y\\0%P\\0%l\\0"],
        )?;
        if !output.success() {
            self.diagnostics.warn(&format!(
                "The command find of the unmanaged files scan ran into an issue. The error output was:\n{}",
                output.stderr_lossy()
            ));
        }
        Ok(parse_find_output(&output.stdout, self.diagnostics))
    }

    fn extract(
        &self,
        scan: &ScanResult,
        excluded: &[String],
        entries: &mut [UnmanagedEntry],
    ) -> Result<()> {
        let mut tmp_store = ScopeFileStore::new(&self.config.store_path, TMP_STORE_NAME);
        tmp_store.remove()?;
        tmp_store.create()?;

        let extractor = TreeExtractor::new(
            &self.config.root,
            &tmp_store,
            self.config.archive.compression,
            self.diagnostics,
        );

        let mut loose: Vec<String> = scan.files.clone();
        loose.extend(scan.links.iter().cloned());
        let files_archive = extractor.extract_files(&loose, excluded)?;
        self.diagnostics.progress(&format!(
            "Extracted {}",
            pluralize(loose.len(), "file or tree", "files and trees")
        ));

        let trees = extractor.extract_trees(&scan.trees, excluded)?;
        self.diagnostics.progress(&format!(
            "Extracted {}",
            pluralize(loose.len() + trees.len(), "file or tree", "files and trees")
        ));

        self.apply_archive_metadata(&files_archive, &trees, entries)?;

        ScopeFileStore::new(&self.config.store_path, STORE_NAME).remove()?;
        tmp_store.rename(STORE_NAME)?;
        Ok(())
    }

    /// Fill in owner, mode and size from the written archives
    fn apply_archive_metadata(
        &self,
        files_archive: &ExtractedTree,
        trees: &[ExtractedTree],
        entries: &mut [UnmanagedEntry],
    ) -> Result<()> {
        let index: HashMap<String, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path().to_string(), i))
            .collect();

        for member in list_archive(&files_archive.archive_location)? {
            let Some(&i) = index.get(&member.path) else {
                self.diagnostics.warn(&format!(
                    "Unexpected member {} in {}",
                    member.path,
                    files_archive.archive_location.display()
                ));
                continue;
            };
            let entry = &mut entries[i];
            entry.user = Some(member.user);
            entry.group = Some(member.group);
            if member.kind != EntryKind::Link {
                entry.mode = Some(format!("{:o}", member.mode));
                entry.size = Some(member.size);
            }
        }

        for tree in trees {
            let Some(root) = tree.root_path.as_deref() else {
                continue;
            };
            let Some(&i) = index.get(root) else {
                continue;
            };
            let members = list_archive(&tree.archive_location)?;
            let entry = &mut entries[i];
            if let Some(top) = members.iter().find(|m| m.path == root) {
                entry.user = Some(top.user.clone());
                entry.group = Some(top.group.clone());
                entry.mode = Some(format!("{:o}", top.mode));
            }
            entry.size = Some(members.iter().map(|m| m.size).sum());
            entry.files = Some(members.len());
        }

        Ok(())
    }
}

/// Parse NUL separated `find` output into entries
///
/// Names that are not valid UTF-8 are skipped with a warning.
fn parse_find_output(
    output: &[u8],
    diagnostics: &dyn crate::diagnostics::Diagnostics,
) -> Vec<FindEntry> {
    let fields: Vec<&[u8]> = output.split(|b| *b == 0).collect();
    let mut entries = Vec::new();

    for record in fields.chunks(3) {
        let [kind, raw_path, raw_link] = record else {
            continue;
        };
        if raw_path.is_empty() {
            continue;
        }

        let path = std::str::from_utf8(raw_path);
        let link = std::str::from_utf8(raw_link);
        let (Ok(path), Ok(link)) = (path, link) else {
            let mut broken = Vec::new();
            if path.is_err() {
                broken.push(format!("filename '{}'", String::from_utf8_lossy(raw_path)));
            }
            if link.is_err() {
                broken.push(format!("link target '{}'", String::from_utf8_lossy(raw_link)));
            }
            let verb = if broken.len() == 1 { "contains" } else { "contain" };
            let mut warning = format!("{} {} invalid UTF-8 characters. Skipping.", broken.join(" and "), verb);
            if let Some(first) = warning.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            diagnostics.warn(&warning);
            continue;
        };

        entries.push(FindEntry {
            kind: kind.first().map(|b| *b as char).unwrap_or('?'),
            path: path.to_string(),
            link: link.to_string(),
        });
    }

    entries
}

/// Whether `path` lies strictly below directory `dir`
fn is_below(path: &str, dir: &str) -> bool {
    path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

/// Glob pattern excluding what a filter matcher matches
fn matcher_pattern(matcher: &str) -> String {
    match matcher.strip_suffix(WILDCARD) {
        Some(prefix) => format!("{}{}", Pattern::escape(prefix), WILDCARD),
        None => Pattern::escape(matcher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InspectConfig;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::system::{CommandOutput, ReplaySystem};

    fn find_output(entries: &[(&str, &str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (kind, path, link) in entries {
            for field in [kind, path, link] {
                out.extend_from_slice(field.as_bytes());
                out.push(0);
            }
        }
        out
    }

    #[test]
    fn test_parse_find_output() {
        let diagnostics = CollectingDiagnostics::new();
        let mut output = find_output(&[("d", "", ""), ("f", "etc/foo", ""), ("l", "etc/bar", "foo")]);
        output.extend_from_slice(b"f\0etc/\xff\0\0");

        let entries = parse_find_output(&output, &diagnostics);
        assert_eq!(
            entries,
            vec![
                FindEntry { kind: 'f', path: "etc/foo".into(), link: "".into() },
                FindEntry { kind: 'l', path: "etc/bar".into(), link: "foo".into() },
            ]
        );
        assert_eq!(
            diagnostics.warnings(),
            vec!["Filename 'etc/\u{FFFD}' contains invalid UTF-8 characters. Skipping."]
        );
    }

    #[test]
    fn test_is_below() {
        assert!(is_below("/opt/a", "/opt"));
        assert!(!is_below("/opt", "/opt"));
        assert!(!is_below("/optional", "/opt"));
    }

    #[test]
    fn test_matcher_pattern() {
        assert_eq!(matcher_pattern("/home/alfred/*"), "/home/alfred/*");
        assert_eq!(matcher_pattern("/srv/[data]"), "/srv/[[]data[]]");
    }

    #[test]
    fn test_entry_path() {
        assert_eq!(UnmanagedEntry::new("/opt/", UnmanagedKind::Dir).path(), "/opt");
        assert_eq!(UnmanagedEntry::new("/etc/foo", UnmanagedKind::File).path(), "/etc/foo");
    }

    #[test]
    fn test_find_failure_keeps_partial_output() {
        let output = CommandOutput::failed(1, "find: '/root/x': Permission denied")
            .with_stdout(find_output(&[("f", "unmanaged", "")]));
        let system = ReplaySystem::new().with_handler("find", move |_| output.clone());
        let diagnostics = CollectingDiagnostics::new();
        let reconciler = PackageFileReconciler::new(&system, &diagnostics, InspectConfig::default());

        let entries = reconciler.find_entries("/", 6).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(diagnostics.warnings().len(), 1);
        assert!(diagnostics.warnings()[0].contains("Permission denied"));
        assert_eq!(
            system.calls(),
            vec!["find / -xdev -maxdepth 6 -printf %y\\0%P\\0%l\\0"]
        );
    }
}
