// src/system/local.rs

//! The machine sysdescribe runs on

use super::{CommandOutput, System, command_line};
use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::process::Command;
use tracing::debug;

/// Inspect the local machine by spawning commands directly
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSystem;

impl LocalSystem {
    pub fn new() -> Self {
        Self
    }
}

impl System for LocalSystem {
    fn run_command(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!("Running: {}", command_line(program, args));

        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::MissingRequirement(program.to_string())
            } else {
                Error::InitError(format!("Failed to run {}: {}", program, e))
            }
        })?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn read_file(&self, path: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn check_requirement(&self, programs: &[&str], args: &[&str]) -> Result<String> {
        for program in programs {
            if which::which(program).is_err() {
                debug!("{} not found in PATH", program);
                continue;
            }
            if let Ok(output) = self.run_command(program, args) {
                if output.success() {
                    return Ok(program.to_string());
                }
            }
        }
        Err(Error::MissingRequirement(programs.join("' or '")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file() {
        let system = LocalSystem::new();
        assert!(system.read_file("/nonexistent/sysdescribe/file").unwrap().is_none());
    }

    #[test]
    fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mounts");
        std::fs::write(&path, "proc /proc proc rw 0 0\n").unwrap();

        let system = LocalSystem::new();
        let content = system.read_file(path.to_str().unwrap()).unwrap();
        assert_eq!(content.as_deref(), Some("proc /proc proc rw 0 0\n"));
    }

    #[test]
    fn test_missing_binary_is_requirement_error() {
        let system = LocalSystem::new();
        let err = system
            .check_requirement(&["sysdescribe-no-such-binary"], &["--version"])
            .unwrap_err();
        assert!(matches!(err, Error::MissingRequirement(_)));
    }
}
