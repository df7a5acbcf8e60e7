// src/packages/manifest.rs

//! Every path the package database knows about
//!
//! Built from `rpm -qlav`, whose lines look like `ls -l` output:
//!
//! ```text
//! drwxr-xr-x    2 root    root                0 Jan 11  2024 /etc/zypp
//! -rw-r--r--    1 root    root             3612 Jan 11  2024 /etc/zypp/zypper.conf
//! lrwxrwxrwx    1 root    root               10 Jan 11  2024 /usr/bin/zypp -> zypper
//! ```

use crate::error::Result;
use crate::system::System;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Managed files, links and directories
#[derive(Debug, Clone, Default)]
pub struct PackageManifest {
    /// Files and links; the value is the link target, empty for files
    files: HashMap<String, String>,
    /// Directories listed by a package or implied as the parent of a
    /// managed entry
    dirs: HashSet<String>,
}

impl PackageManifest {
    /// Query the package database of `system`
    pub fn load(system: &dyn System) -> Result<Self> {
        let output = system
            .run_command("rpm", &["-qlav"])?
            .into_result("rpm -qlav")?;
        Ok(Self::parse(&output.stdout_lossy()))
    }

    /// Build the manifest from `rpm -qlav` output
    pub fn parse(output: &str) -> Self {
        let mut files = HashMap::new();
        let mut dirs = HashSet::new();

        for line in output.lines() {
            let Some(kind) = line.chars().next() else {
                continue;
            };
            let Some(start) = line.find(" /") else {
                continue;
            };
            let entry = &line[start + 1..];

            match kind {
                '-' => {
                    files.insert(entry.to_string(), String::new());
                }
                'd' => {
                    dirs.insert(entry.to_string());
                }
                'l' => {
                    let (link, target) = entry.split_once(" -> ").unwrap_or((entry, ""));
                    files.insert(link.to_string(), target.to_string());
                }
                _ => {}
            }
        }

        // parents of managed directories are managed too
        let listed: Vec<String> = dirs.iter().cloned().collect();
        for dir in &listed {
            mark_parents(&mut dirs, dir);
        }

        // directories leading to a managed file are treated as managed, so
        // unmanaged trees can be told apart from managed ones
        let mut linked_dirs = Vec::new();
        for (file, target) in &files {
            mark_parents(&mut dirs, file);
            if !target.is_empty() && dirs.contains(target) {
                linked_dirs.push(file.clone());
            }
        }
        dirs.extend(linked_dirs);

        debug!("Package manifest: {} files, {} dirs", files.len(), dirs.len());
        Self { files, dirs }
    }

    pub fn is_managed_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn is_managed_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }
}

/// Insert every missing parent of `path` as an implied directory
fn mark_parents(dirs: &mut HashSet<String>, path: &str) {
    let mut dir = match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => return,
    };
    while dir.len() > 1 && !dirs.contains(dir) {
        dirs.insert(dir.to_string());
        dir = match dir.rfind('/') {
            Some(idx) => &dir[..idx],
            None => break,
        };
    }
}
