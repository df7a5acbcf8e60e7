// src/extract/archive.rs

//! Writing and reading extraction archives
//!
//! Archives are tar streams with member names relative to `/` of the
//! inspected system (`/etc/foo` is stored as `etc/foo`). They are written
//! to a temporary file next to the destination and renamed into place.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::compression::{CompressionFormat, Encoder, create_decoder};
use crate::error::{Error, Result};
use crate::filesystem::path::{sanitize_path, under_root};

/// Permission bits of newly created archives
pub const ARCHIVE_MODE: u32 = 0o600;

/// Exclusion patterns matched against inspected absolute paths
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    patterns: Vec<Pattern>,
}

impl Exclusions {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Type of an archive member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Link,
    Other,
}

/// Metadata of one archive member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    /// Absolute path on the inspected system
    pub path: String,
    pub kind: EntryKind,
    pub user: String,
    pub group: String,
    pub mode: u32,
    pub size: u64,
}

/// Write one archive holding `paths` read from below `root`
///
/// Directories are added recursively. Excluded paths are skipped, an
/// excluded directory is skipped with everything below it. Any read
/// failure aborts the archive and leaves the destination untouched.
pub fn write_archive(
    root: &Path,
    paths: &[String],
    exclusions: &Exclusions,
    destination: &Path,
    format: CompressionFormat,
) -> Result<()> {
    let archive_error = |source: io::Error| Error::ArchiveError {
        path: destination.display().to_string(),
        source,
    };

    let dir = destination
        .parent()
        .ok_or_else(|| Error::InvalidPath(format!("{} has no parent", destination.display())))?;
    let temp = NamedTempFile::new_in(dir).map_err(archive_error)?;
    let writer = BufWriter::new(temp.reopen().map_err(archive_error)?);

    let mut builder = tar::Builder::new(Encoder::new(writer, format).map_err(archive_error)?);
    builder.follow_symlinks(false);

    let mut members = 0usize;
    for path in paths {
        if exclusions.is_excluded(path) {
            debug!("Excluding {}", path);
            continue;
        }
        members += append_tree(&mut builder, root, path, exclusions)?;
    }

    let encoder = builder.into_inner().map_err(archive_error)?;
    let mut writer = encoder.finish().map_err(archive_error)?;
    writer.flush().map_err(archive_error)?;
    drop(writer);

    let mode = match fs::metadata(destination) {
        Ok(existing) => existing.permissions().mode() & 0o7777,
        Err(_) => ARCHIVE_MODE,
    };
    fs::set_permissions(temp.path(), fs::Permissions::from_mode(mode)).map_err(archive_error)?;
    temp.persist(destination)
        .map_err(|e| archive_error(e.error))?;

    debug!("Wrote {} members to {}", members, destination.display());
    Ok(())
}

fn append_tree<W: Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    path: &str,
    exclusions: &Exclusions,
) -> Result<usize> {
    let source = under_root(root, path)?;
    let name = sanitize_path(path)?;
    let mut members = 0;

    let walker = WalkDir::new(&source)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let inspected = inspected_path(&name, &source, entry.path());
            !exclusions.is_excluded(&inspected)
        });

    for entry in walker {
        let entry = entry?;
        let member = match entry.path().strip_prefix(&source) {
            Ok(rest) if rest.as_os_str().is_empty() => name.clone(),
            Ok(rest) => name.join(rest),
            Err(_) => continue,
        };
        builder
            .append_path_with_name(entry.path(), &member)
            .map_err(|source| Error::ArchiveError {
                path: entry.path().display().to_string(),
                source,
            })?;
        members += 1;
    }

    Ok(members)
}

/// Absolute inspected path of a file found below `source`
fn inspected_path(name: &Path, source: &Path, file: &Path) -> String {
    let relative: PathBuf = match file.strip_prefix(source) {
        Ok(rest) if !rest.as_os_str().is_empty() => name.join(rest),
        _ => name.to_path_buf(),
    };
    format!("/{}", relative.display())
}

/// Read back the member list of an archive
pub fn list_archive(archive: &Path) -> Result<Vec<ArchiveEntry>> {
    let archive_error = |source: io::Error| Error::ArchiveError {
        path: archive.display().to_string(),
        source,
    };

    let mut reader = BufReader::new(File::open(archive).map_err(archive_error)?);
    let mut magic = [0u8; 4];
    let read = reader.read(&mut magic).map_err(archive_error)?;
    let format = CompressionFormat::from_magic_bytes(&magic[..read]);

    let stream = io::Cursor::new(magic[..read].to_vec()).chain(reader);
    let mut tar = tar::Archive::new(create_decoder(stream, format).map_err(archive_error)?);

    let mut entries = Vec::new();
    for entry in tar.entries().map_err(archive_error)? {
        let entry = entry.map_err(archive_error)?;
        let header = entry.header();
        let path = entry.path().map_err(archive_error)?;
        let path = format!("/{}", path.to_string_lossy().trim_end_matches('/'));

        let kind = match header.entry_type() {
            tar::EntryType::Regular | tar::EntryType::Continuous => EntryKind::File,
            tar::EntryType::Directory => EntryKind::Dir,
            tar::EntryType::Symlink => EntryKind::Link,
            _ => EntryKind::Other,
        };

        let user = match header.username() {
            Ok(Some(name)) if !name.is_empty() => name.to_string(),
            _ => header.uid().map_err(archive_error)?.to_string(),
        };
        let group = match header.groupname() {
            Ok(Some(name)) if !name.is_empty() => name.to_string(),
            _ => header.gid().map_err(archive_error)?.to_string(),
        };

        entries.push(ArchiveEntry {
            path,
            kind,
            user,
            group,
            mode: header.mode().map_err(archive_error)? & 0o7777,
            size: header.size().map_err(archive_error)?,
        });
    }

    Ok(entries)
}
