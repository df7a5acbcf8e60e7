// src/packages/verify.rs

//! Decoding of package verification records
//!
//! `rpm -V` prints one record per file whose on-disk state differs from the
//! package database:
//!
//! ```text
//! S.5....T.  c /etc/sysconfig/network
//! missing     /usr/share/doc/foo/README
//! ```
//!
//! The first field has nine positions in fixed order: size, mode, digest,
//! device number, link path, user, group, mtime, capabilities. Each position
//! is `.` (unchanged), the position's designator letter (changed) or `?`
//! (the test could not be performed). The optional second field is the file
//! attribute marker (`c` config, `d` documentation, ...).

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of positions in a verification flag field
pub const FLAG_WIDTH: usize = 9;

/// Kind of difference between a file and its package metadata
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    Size,
    Mode,
    Md5,
    DeviceNumber,
    LinkPath,
    User,
    Group,
    Time,
    Capabilities,
    /// Something changed, but no known designator says what
    #[strum(serialize = "other_rpm_changes")]
    #[serde(rename = "other_rpm_changes")]
    OtherChange,
    /// The file is gone from disk
    Deleted,
    /// The file was replaced by another package's copy
    Replaced,
}

/// Designator letter and category for each flag position, left to right
const FLAG_POSITIONS: [(char, ChangeCategory); FLAG_WIDTH] = [
    ('S', ChangeCategory::Size),
    ('M', ChangeCategory::Mode),
    ('5', ChangeCategory::Md5),
    ('D', ChangeCategory::DeviceNumber),
    ('L', ChangeCategory::LinkPath),
    ('U', ChangeCategory::User),
    ('G', ChangeCategory::Group),
    ('T', ChangeCategory::Time),
    ('P', ChangeCategory::Capabilities),
];

const REPLACED_SUFFIX: &str = " (replaced)";

/// One decoded verification record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: String,
    /// Never empty; bit categories appear in flag position order
    pub changes: Vec<ChangeCategory>,
    /// File attribute marker, `None` for plain files
    pub flag: Option<char>,
}

impl ChangeRecord {
    pub fn is_config(&self) -> bool {
        self.flag == Some('c')
    }

    pub fn is_deleted(&self) -> bool {
        self.changes == [ChangeCategory::Deleted]
    }

    /// Categories as report strings (`md5`, `device_number`, ...)
    pub fn change_names(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.as_ref()).collect()
    }
}

/// Check whether an output line has the shape of a verification record
///
/// `rpm -Va` interleaves records with dependency complaints and other
/// messages; only lines of the form `<flags> <marker?> /path` are records.
pub fn is_record_line(line: &str) -> bool {
    let Some((flags, rest)) = line.split_once(' ') else {
        return false;
    };
    !flags.is_empty() && split_marker_and_path(rest).is_some()
}

/// Decode a single verification record
///
/// A flag field that is not exactly nine characters wide means the output
/// format of the verification tool changed; this is reported as
/// `Error::MalformedVerifyLine`. Records with untestable positions (`?`)
/// decode normally and produce one warning per record.
pub fn decode_line(line: &str, diagnostics: &dyn Diagnostics) -> Result<ChangeRecord> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (flags, rest) = line
        .split_once(' ')
        .ok_or_else(|| Error::ParseError(format!("Verification line without path: {}", line)))?;
    let (flag, path) = split_marker_and_path(rest)
        .ok_or_else(|| Error::ParseError(format!("Verification line without path: {}", line)))?;

    if flags == "missing" {
        return Ok(ChangeRecord {
            path: path.to_string(),
            changes: vec![ChangeCategory::Deleted],
            flag,
        });
    }

    let width = flags.chars().count();
    if width != FLAG_WIDTH {
        return Err(Error::MalformedVerifyLine {
            line: line.to_string(),
            width,
        });
    }

    if flags.chars().all(|c| c == '.') {
        if let Some(path) = path.strip_suffix(REPLACED_SUFFIX) {
            return Ok(ChangeRecord {
                path: path.to_string(),
                changes: vec![ChangeCategory::Replaced],
                flag,
            });
        }
    }

    let mut changes = Vec::new();
    let mut untested = false;
    for (c, (designator, category)) in flags.chars().zip(FLAG_POSITIONS) {
        if c == designator {
            changes.push(category);
        } else if c == '?' {
            untested = true;
        }
    }
    if changes.is_empty() {
        changes.push(ChangeCategory::OtherChange);
    }

    if untested {
        diagnostics.warn(&format!(
            "Could not perform all tests on rpm changes for file '{}'.",
            path
        ));
    }

    Ok(ChangeRecord {
        path: path.to_string(),
        changes,
        flag,
    })
}

/// Split `"  c /etc/foo"` or `"    /usr/bin/foo"` into marker and path
fn split_marker_and_path(rest: &str) -> Option<(Option<char>, &str)> {
    let rest = rest.trim_start_matches(' ');
    if rest.starts_with('/') {
        return Some((None, rest));
    }

    let mut chars = rest.chars();
    let marker = chars.next()?;
    let path = chars.as_str().strip_prefix(' ')?.trim_start_matches(' ');
    if path.starts_with('/') {
        Some((Some(marker), path))
    } else {
        None
    }
}
