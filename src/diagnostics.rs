//! Structured, non-fatal messages produced while interpreting a route.
//!
//! Handlers never return errors for malformed input. They emit a
//! [`Diagnostic`] through a [`DiagnosticSink`], substitute a default and carry on.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

/// Which class of recoverable problem a diagnostic describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A number or enumerated value could not be parsed.
    MalformedLiteral,
    /// A referenced file or object could not be found or loaded.
    MissingResource,
    /// A negative index, or a reference to something not declared yet.
    IndexOutOfRange,
    /// The namespace/command pair is not part of the language.
    UnsupportedCommand,
    /// An argument is syntactically fine but semantically unusable.
    InvalidArgument,
    /// `$Include`, `$Sub`, `$If` and friends.
    Preprocessor,
}

impl DiagnosticKind {
    fn label(self) -> &'static str {
        match self {
            DiagnosticKind::MalformedLiteral => "literal",
            DiagnosticKind::MissingResource => "resource",
            DiagnosticKind::IndexOutOfRange => "index",
            DiagnosticKind::UnsupportedCommand => "command",
            DiagnosticKind::InvalidArgument => "argument",
            DiagnosticKind::Preprocessor => "preprocessor",
        }
    }
}

/// Source location of an expression: file name plus 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Flagged for user visibility (missing resources).
    pub critical: bool,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            critical: false,
            message: message.into(),
            location,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            critical: false,
            message: message.into(),
            location,
        }
    }

    /// A missing-resource error. Always critical.
    pub fn missing(message: impl Into<String>, location: Location) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::MissingResource,
            critical: true,
            message: message.into(),
            location,
        }
    }

    /// Format the diagnostic with its location, e.g.
    /// `[literal] route.csv:12:3: Gauge is invalid`.
    pub fn format_with_location(&self) -> String {
        format!("[{}] {}: {}", self.kind.label(), self.location, self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Receiver for diagnostics. The interpreter only ever pushes into it.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Collecting sink that also mirrors every entry to the `log` facade.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }

    pub fn count_kind(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has_critical(&self) -> bool {
        self.entries.iter().any(|d| d.critical)
    }
}

impl DiagnosticSink for Diagnostics {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{}", diagnostic.format_with_location()),
            Severity::Error => log::error!("{}", diagnostic.format_with_location()),
        }
        self.entries.push(diagnostic);
    }
}
