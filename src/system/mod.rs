// src/system/mod.rs

//! Access to the system being inspected
//!
//! Every external inspection command (rpm, stat, find) and every file read
//! goes through the `System` trait. The core never spawns processes itself,
//! so it can run against the local machine (`LocalSystem`) or against output
//! that was collected earlier (`ReplaySystem`).

mod local;
mod replay;

pub use local::LocalSystem;
pub use replay::ReplaySystem;

use crate::error::{Error, Result};

/// Captured result of one command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status (-1 when the process was killed by a signal)
    pub status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Failed output with the given status and stderr
    pub fn failed(status: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    /// Attach stdout to a failed output (commands that fail part-way)
    pub fn with_stdout(mut self, stdout: impl Into<Vec<u8>>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Turn a non-zero exit status into `Error::CommandFailed`
    pub fn into_result(self, command: &str) -> Result<Self> {
        self.accept_status(command, &[0])
    }

    /// Like `into_result`, but treats every status in `accepted` as success
    pub fn accept_status(self, command: &str, accepted: &[i32]) -> Result<Self> {
        if accepted.contains(&self.status) {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                command: command.to_string(),
                status: self.status,
                stderr: self.stderr_lossy(),
            })
        }
    }
}

/// A system whose state can be inspected
pub trait System: Send + Sync {
    /// Run a command to completion and capture its output
    ///
    /// A non-zero exit status is not an error at this level; callers decide
    /// which statuses they accept. Failing to start the command is.
    fn run_command(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Read a text file, `None` when it does not exist
    fn read_file(&self, path: &str) -> Result<Option<String>>;

    /// Check that one of `programs` can be executed with `args`
    ///
    /// Returns the first program that ran successfully. The error names all
    /// alternatives that were tried.
    fn check_requirement(&self, programs: &[&str], args: &[&str]) -> Result<String> {
        for program in programs {
            if let Ok(output) = self.run_command(program, args) {
                if output.success() {
                    return Ok(program.to_string());
                }
            }
        }
        Err(Error::MissingRequirement(programs.join("' or '")))
    }
}

/// Render a command line for logs and error messages
pub fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_status() {
        let output = CommandOutput::failed(1, "differences found").with_stdout("S.5......    /etc/foo\n");
        let output = output.accept_status("rpm -Va", &[0, 1]).unwrap();
        assert_eq!(output.stdout_lossy(), "S.5......    /etc/foo\n");

        let err = CommandOutput::failed(2, "boom").into_result("rpm -Va").unwrap_err();
        assert!(matches!(err, Error::CommandFailed { status: 2, .. }));
    }

    #[test]
    fn test_check_requirement_names_all_alternatives() {
        let system = ReplaySystem::new();
        let err = system.check_requirement(&["gtar", "tar"], &["--version"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Need binary 'gtar' or 'tar' to be available on the inspected system"
        );
    }

    #[test]
    fn test_command_line() {
        assert_eq!(command_line("rpm", &["-qf", "/etc/hosts"]), "rpm -qf /etc/hosts");
        assert_eq!(command_line("true", &[]), "true");
    }
}
