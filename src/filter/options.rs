// src/filter/options.rs

//! Turning command line filter options into a `FilterRegistry`
//!
//! Two options feed the registry after the configured defaults:
//!
//! - `--skip-files`: comma separated paths, each one excluded from the
//!   unmanaged files scan
//! - `--exclude`: full filter definitions
//!
//! Both accept `@<file>` entries naming a file with one entry per line.
//! `\@` is a literal `@`.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::definition::split_segments;
use super::registry::FilterRegistry;
use crate::error::{Error, Result};

/// Scope of the unmanaged files scan
pub const UNMANAGED_FILES_SCOPE: &str = "/unmanaged_files/files/name";

/// Scope of changed package files that are not config files
pub const CHANGED_MANAGED_FILES_SCOPE: &str = "/changed_managed_files/files/name";

/// Scope of changed config files
pub const CHANGED_CONFIG_FILES_SCOPE: &str = "/changed_config_files/files/name";

/// Scope of the change categories of changed package files
pub const CHANGED_MANAGED_FILES_CHANGES_SCOPE: &str = "/changed_managed_files/files/changes";

/// Scope of the change categories of changed config files
pub const CHANGED_CONFIG_FILES_CHANGES_SCOPE: &str = "/changed_config_files/files/changes";

/// Build the registry for one inspection run
pub fn build_filter<S: AsRef<str>>(
    defaults: &[S],
    skip_files: Option<&str>,
    exclude: Option<&str>,
) -> Result<FilterRegistry> {
    let mut definitions: Vec<String> = defaults.iter().map(|d| d.as_ref().to_string()).collect();

    if let Some(skip_files) = skip_files {
        definitions.extend(skip_files_definitions(skip_files)?);
    }
    if let Some(exclude) = exclude {
        definitions.extend(exclude_definitions(exclude)?);
    }

    FilterRegistry::from_definitions(definitions.iter().map(|definition| {
        let definition = definition.replace("\\@", "@");
        debug!("Adding filter definition: {}", definition);
        definition
    }))
}

/// Definitions for a `--skip-files` value
pub fn skip_files_definitions(skip_files: &str) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in split_unescaped_commas(skip_files) {
        match entry.strip_prefix('@') {
            Some(path) => files.extend(
                read_filter_file(path)?
                    .into_iter()
                    .map(|line| escape_commas(&line)),
            ),
            None => files.push(entry),
        }
    }

    Ok(files
        .into_iter()
        .filter(|file| !file.is_empty())
        .map(|file| {
            let file = match file.strip_suffix('/') {
                Some(stripped) if !stripped.is_empty() => stripped.to_string(),
                _ => file,
            };
            format!("{}={}", UNMANAGED_FILES_SCOPE, file)
        })
        .collect())
}

/// Definitions for an `--exclude` value
///
/// Consecutive non-file segments stay together so that value lists
/// continuing a clause are not cut off from it.
pub fn exclude_definitions(exclude: &str) -> Result<Vec<String>> {
    let mut definitions = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for segment in split_segments(exclude)? {
        match segment.text.strip_prefix('@').filter(|_| !segment.quoted) {
            Some(path) => {
                flush(&mut pending, &mut definitions);
                definitions.extend(read_filter_file(path)?);
            }
            None => pending.push(segment.to_definition()),
        }
    }
    flush(&mut pending, &mut definitions);

    definitions.retain(|d| !d.is_empty());
    Ok(definitions)
}

fn flush(pending: &mut Vec<String>, definitions: &mut Vec<String>) {
    if !pending.is_empty() {
        definitions.push(pending.join(","));
        pending.clear();
    }
}

/// Lines of a filter file, trimmed
fn read_filter_file(path: &str) -> Result<Vec<String>> {
    let filename = expand_home(path);
    if !filename.exists() {
        return Err(Error::NotFoundError(format!(
            "The filter file '{}' does not exist.",
            filename.display()
        )));
    }

    let content = fs::read_to_string(&filename)?;
    Ok(content.lines().map(|l| l.trim().to_string()).collect())
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

/// Split on commas not preceded by a backslash; escapes are kept
fn split_unescaped_commas(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut previous = None;

    for c in text.chars() {
        if c == ',' && previous != Some('\\') {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
        previous = Some(c);
    }
    parts.push(current);
    parts
}

fn escape_commas(text: &str) -> String {
    split_unescaped_commas(text).join("\\,")
}
