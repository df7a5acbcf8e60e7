// src/diagnostics.rs

//! User-facing warnings and progress notes
//!
//! Inspection code never prints directly. Anything the user should see
//! (untestable verification records, skipped file names, find failures,
//! "Found N files" notes) is handed to a `Diagnostics` implementation:
//!
//! - `LogDiagnostics`: forwards to tracing (default for the CLI)
//! - `CollectingDiagnostics`: keeps messages in memory for later display
//! - `SilentDiagnostics`: drops everything
//!
//! # Example
//!
//! ```
//! use sysdescribe::diagnostics::{CollectingDiagnostics, Diagnostics};
//!
//! let diagnostics = CollectingDiagnostics::new();
//! diagnostics.warn("Could not perform all tests on rpm changes for file '/etc/foo'.");
//! assert_eq!(diagnostics.warnings().len(), 1);
//! ```

use std::sync::Mutex;
use tracing::{info, warn};

/// Sink for user-facing warnings and progress messages
///
/// Implementations must be thread-safe; tree extraction reports from
/// worker threads.
pub trait Diagnostics: Send + Sync {
    /// Report a non-fatal problem
    fn warn(&self, message: &str);

    /// Report scan or extraction progress
    fn progress(&self, message: &str);
}

/// Diagnostics sink that drops all messages
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentDiagnostics;

impl Diagnostics for SilentDiagnostics {
    fn warn(&self, _message: &str) {}

    fn progress(&self, _message: &str) {}
}

/// Diagnostics sink that logs through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn warn(&self, message: &str) {
        warn!("{}", message);
    }

    fn progress(&self, message: &str) {
        info!("{}", message);
    }
}

/// Diagnostics sink that keeps every message
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    warnings: Mutex<Vec<String>>,
    progress: Mutex<Vec<String>>,
}

impl CollectingDiagnostics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Warnings reported so far, in order
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Progress messages reported so far, in order
    pub fn progress_messages(&self) -> Vec<String> {
        self.progress
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn warn(&self, message: &str) {
        warn!("{}", message);
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(message.to_string());
        }
    }

    fn progress(&self, message: &str) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.push(message.to_string());
        }
    }
}

/// Format "N thing"/"N things" for progress messages
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_keeps_order() {
        let diagnostics = CollectingDiagnostics::new();
        diagnostics.warn("first");
        diagnostics.progress("scanning");
        diagnostics.warn("second");

        assert_eq!(diagnostics.warnings(), vec!["first", "second"]);
        assert_eq!(diagnostics.progress_messages(), vec!["scanning"]);
    }

    #[test]
    fn test_silent_is_noop() {
        let diagnostics = SilentDiagnostics;
        diagnostics.warn("ignored");
        diagnostics.progress("ignored");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "file", "files"), "1 file");
        assert_eq!(pluralize(0, "file", "files"), "0 files");
        assert_eq!(pluralize(7, "file or tree", "files and trees"), "7 files and trees");
    }
}
