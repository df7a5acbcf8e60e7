// src/packages/query.rs

//! File ownership queries against the package database

use crate::error::{Error, Result};
use crate::system::System;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name and upstream version of an installed package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

/// Parse a `name-version-release.arch` token
///
/// The token is split on its last two hyphens, so package names that
/// contain hyphens survive intact:
///
/// ```
/// use sysdescribe::packages::parse_package_token;
///
/// let pkg = parse_package_token("zypper-1.6.311-16.2.3.x86_64").unwrap();
/// assert_eq!(pkg.name, "zypper");
/// assert_eq!(pkg.version, "1.6.311");
///
/// let pkg = parse_package_token("perl-XML-Parser-2.44-1.1.x86_64").unwrap();
/// assert_eq!(pkg.name, "perl-XML-Parser");
/// ```
pub fn parse_package_token(token: &str) -> Result<PackageId> {
    let token = token.trim();
    let mut parts = token.rsplitn(3, '-');
    let _release_arch = parts.next();
    let version = parts.next();
    let name = parts.next();

    match (name, version) {
        (Some(name), Some(version)) if !name.is_empty() && !version.is_empty() => Ok(PackageId {
            name: name.to_string(),
            version: version.to_string(),
        }),
        _ => Err(Error::ParseError(format!(
            "Unexpected package token '{}', expected name-version-release.arch",
            token
        ))),
    }
}

/// Find the package owning `path`
///
/// A path no package claims is `Ok(None)`, not an error. When several
/// packages own the path the first one reported wins.
pub fn query_owner(system: &dyn System, path: &str) -> Result<Option<PackageId>> {
    let output = system.run_command("rpm", &["-qf", path])?;
    let stdout = output.stdout_lossy();

    if !output.success() {
        if is_unowned_message(&stdout) || is_unowned_message(&output.stderr_lossy()) {
            debug!("{} is not owned by any package", path);
            return Ok(None);
        }
        return Err(Error::CommandFailed {
            command: format!("rpm -qf {}", path),
            status: output.status,
            stderr: output.stderr_lossy(),
        });
    }

    match stdout.split_whitespace().next() {
        Some(token) => parse_package_token(token).map(Some),
        None => Ok(None),
    }
}

fn is_unowned_message(text: &str) -> bool {
    text.contains("is not owned by any package")
}
