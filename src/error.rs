// src/error.rs

//! Error types for sysdescribe
//!
//! A single error enum is shared by every subsystem. Variants group failures
//! by what went wrong (malformed command output, missing tools, archive I/O)
//! rather than by the module that noticed it.

use thiserror::Error;

/// Errors raised while inspecting a system
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A verification record whose flag field does not have nine positions
    #[error("Malformed verification line (expected 9 flag characters, found {width}): {line}")]
    MalformedVerifyLine { line: String, width: usize },

    /// A mount table record that does not have six fields
    #[error("Malformed mount table line (expected 6 fields, found {fields}): {line}")]
    MalformedMountLine { line: String, fields: usize },

    /// A binary the inspection relies on is not available on the inspected system
    #[error("Need binary '{0}' to be available on the inspected system")]
    MissingRequirement(String),

    #[error("Command '{command}' failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// Writing or reading an archive for one tree failed
    #[error("Archive error for {path}: {source}")]
    ArchiveError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for sysdescribe operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::ParseError(format!("Invalid exclusion pattern: {}", err))
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        match err.into_io_error() {
            Some(source) => Error::ArchiveError { path, source },
            None => Error::InvalidPath(format!("Filesystem loop detected at {}", path)),
        }
    }
}
