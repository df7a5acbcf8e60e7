// src/system/replay.rs

//! Serve previously collected command output
//!
//! `ReplaySystem` answers commands from recorded output instead of running
//! them. It is used to run the inspection core on output gathered elsewhere
//! and as the test double for every subsystem. Each invocation is counted.

use super::{CommandOutput, System, command_line};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;

type Handler = Box<dyn Fn(&[&str]) -> CommandOutput + Send + Sync>;

/// A `System` backed by recorded command output and file contents
#[derive(Default)]
pub struct ReplaySystem {
    /// Output keyed by the full command line
    commands: HashMap<String, CommandOutput>,
    /// Fallback per program, computed from the arguments
    handlers: HashMap<String, Handler>,
    files: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl ReplaySystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the output of one exact command line
    pub fn with_command(mut self, program: &str, args: &[&str], output: CommandOutput) -> Self {
        self.commands.insert(command_line(program, args), output);
        self
    }

    /// Answer every invocation of `program` not recorded exactly
    pub fn with_handler<F>(mut self, program: &str, handler: F) -> Self
    where
        F: Fn(&[&str]) -> CommandOutput + Send + Sync + 'static,
    {
        self.handlers.insert(program.to_string(), Box::new(handler));
        self
    }

    /// Make `program --version` succeed
    pub fn with_binary(self, program: &str) -> Self {
        self.with_command(program, &["--version"], CommandOutput::ok(format!("{} 1.0\n", program)))
    }

    /// Record the content of a file
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    /// Number of times the exact command line was run
    pub fn invocations(&self, program: &str, args: &[&str]) -> usize {
        let wanted = command_line(program, args);
        self.calls()
            .iter()
            .filter(|call| **call == wanted)
            .count()
    }

    /// Number of times `program` was run with any arguments
    pub fn program_invocations(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(' ').next() == Some(program))
            .count()
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl System for ReplaySystem {
    fn run_command(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let line = command_line(program, args);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        if let Some(output) = self.commands.get(&line) {
            return Ok(output.clone());
        }
        if let Some(handler) = self.handlers.get(program) {
            return Ok(handler(args));
        }
        Err(Error::MissingRequirement(program.to_string()))
    }

    fn read_file(&self, path: &str) -> Result<Option<String>> {
        Ok(self.files.get(path).cloned())
    }
}
