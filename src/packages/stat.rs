// src/packages/stat.rs

//! Ownership and permission data for files on the inspected system
//!
//! Attributes are collected with `stat --printf` in batches, so thousands of
//! changed files cost a handful of process spawns instead of one each.

use crate::error::{Error, Result};
use crate::system::System;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// `stat` format: mode, user, group, uid, gid, type, name
const STAT_FORMAT: &str = "%a:%U:%G:%u:%g:%F:%n\\n";

/// Default maximum accumulated argument length per `stat` call
pub const DEFAULT_BATCH_LIMIT: usize = 50_000;

/// Type of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Dir,
    Link,
}

/// Attributes of one file as reported by `stat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    /// Octal permission bits as printed by stat (`644`, `4755`)
    pub mode: String,
    pub user: String,
    pub group: String,
    pub kind: FileKind,
    /// Link target, only for symbolic links
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Parse one `stat` output line into path and attributes
///
/// Unknown user or group names fall back to the numeric ids.
pub fn parse_stat_line(line: &str) -> Result<(String, FileAttributes)> {
    let line = line.trim_end_matches('\n');
    let fields: Vec<&str> = line.splitn(7, ':').collect();
    if fields.len() < 7 {
        return Err(Error::ParseError(format!("Unexpected stat output: {}", line)));
    }

    let user = if fields[1] == "UNKNOWN" { fields[3] } else { fields[1] };
    let group = if fields[2] == "UNKNOWN" { fields[4] } else { fields[2] };
    let path = fields[6].to_string();

    let kind = match fields[5] {
        "directory" => FileKind::Dir,
        "symbolic link" => FileKind::Link,
        t if t.ends_with("file") => FileKind::File,
        other => {
            return Err(Error::ParseError(format!(
                "The inspection failed because of the unknown type `{}` of file `{}`.",
                other, path
            )));
        }
    };

    Ok((
        path,
        FileAttributes {
            mode: fields[0].to_string(),
            user: user.to_string(),
            group: group.to_string(),
            kind,
            target: None,
        },
    ))
}

/// Split `paths` into batches whose joined length stays below `limit`
///
/// A single path longer than the limit still gets its own batch.
pub fn batches(paths: &[String], limit: usize) -> Vec<&[String]> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut len = 0;

    for (i, path) in paths.iter().enumerate() {
        if i > start && len + path.len() + 1 >= limit {
            result.push(&paths[start..i]);
            start = i;
            len = 0;
        }
        len += path.len() + 1;
    }
    if start < paths.len() {
        result.push(&paths[start..]);
    }
    result
}

/// Read the target of a symbolic link
pub fn link_target(system: &dyn System, link: &str) -> Result<String> {
    let output = system
        .run_command("find", &[link, "-prune", "-printf", "%l"])?
        .into_result("find -printf %l")?;
    Ok(output.stdout_lossy().trim().to_string())
}

/// Collect attributes for all `paths`, keyed by path
pub fn query_attributes(
    system: &dyn System,
    paths: &[String],
    limit: usize,
) -> Result<HashMap<String, FileAttributes>> {
    let mut attributes = HashMap::new();

    for batch in batches(paths, limit) {
        let mut args: Vec<&str> = vec!["--printf", STAT_FORMAT];
        args.extend(batch.iter().map(String::as_str));

        // stat exits non-zero when some paths vanished; keep what it printed
        let output = system.run_command("stat", &args)?;
        if !output.success() {
            debug!("stat reported errors: {}", output.stderr_lossy());
        }

        for line in output.stdout_lossy().lines() {
            if line.is_empty() {
                continue;
            }
            let (path, mut attrs) = parse_stat_line(line)?;
            if attrs.kind == FileKind::Link {
                attrs.target = Some(link_target(system, &path)?);
            }
            attributes.insert(path, attrs);
        }
    }

    debug!("Collected attributes for {} of {} paths", attributes.len(), paths.len());
    Ok(attributes)
}
