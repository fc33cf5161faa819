//! User-facing messages with location, notes and help lines.
//!
//! Errors convert into `anyhow::Error`, so commands can return them and
//! let `main` print them; warnings are printed on the spot with [`emit`].

use std::fmt;
use std::path::PathBuf;

/// Help texts shared by several commands.
pub mod suggestions {
    pub const NO_MANIFEST: &str = "Create a modbuild.toml declaring your modules and programs";

    pub const NOT_CONFIGURED: &str = "Run `modbuild configure` first";

    pub const UNRESOLVED_DEPENDENCY: &str =
        "Declare the dependency, or check that it uses the same language as its dependent";

    pub const TARGET_NOT_FOUND: &str = "Run `modbuild plan` to see available targets";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn label(self, color: bool) -> &'static str {
        match (self, color) {
            (Severity::Error, false) => "error",
            (Severity::Warning, false) => "warning",
            (Severity::Error, true) => "\x1b[1;31merror\x1b[0m",
            (Severity::Warning, true) => "\x1b[1;33mwarning\x1b[0m",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Note {
    Context(String),
    Help(String),
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<PathBuf>,
    notes: Vec<Note>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            location: None,
            notes: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.notes.push(Note::Context(context.into()));
        self
    }

    pub fn with_suggestion(mut self, help: impl Into<String>) -> Self {
        self.notes.push(Note::Help(help.into()));
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Render with a severity prefix, as printed to the terminal.
    pub fn format(&self, color: bool) -> String {
        let mut out = format!("{}: {}\n", self.severity.label(color), self.message);
        self.write_details(&mut out, color);
        out
    }

    fn write_details(&self, out: &mut String, color: bool) {
        if let Some(path) = &self.location {
            out.push_str(&format!("  --> {}\n", path.display()));
        }
        // context lines before help lines, each group in insertion order
        for note in &self.notes {
            if let Note::Context(text) = note {
                out.push_str(&format!("  = {}\n", text));
            }
        }
        let help = if color { "\x1b[1;32mhelp\x1b[0m" } else { "help" };
        for note in &self.notes {
            if let Note::Help(text) = note {
                out.push_str(&format!("{}: {}\n", help, text));
            }
        }
    }
}

/// The message and its details without the severity prefix, which the
/// caller's error printer supplies.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut details = String::new();
        self.write_details(&mut details, false);
        write!(f, "{}", self.message)?;
        if !details.is_empty() {
            write!(f, "\n{}", details.trim_end())?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
