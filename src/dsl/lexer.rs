use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Location};
use crate::paths;

use super::preprocess::SourceLine;

/// The two textual dialects of the route language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Dialect {
    /// Comma-separated expressions, `Namespace.Command(indices) args`.
    Csv,
    /// Sectioned `[Railway]` style with `Name(indices) = args` lines.
    Rw,
}

impl Dialect {
    /// Pick a dialect from the file extension, falling back to sniffing the
    /// content. `None` means nothing looked like a route file.
    pub fn detect(file_name: &str, text: &str) -> Option<Self> {
        match paths::extension_of(file_name).as_deref() {
            Some("csv") => return Some(Dialect::Csv),
            Some("rw") => return Some(Dialect::Rw),
            _ => {}
        }
        for line in text.lines() {
            let line = line.trim().to_ascii_lowercase();
            if line.starts_with("[railway]") || line.starts_with("[object]") || line.starts_with("[route]") {
                return Some(Dialect::Rw);
            }
            if line.starts_with("with ")
                || ["track.", "structure.", "route.", "options.", "train."]
                    .iter()
                    .any(|p| line.starts_with(p))
            {
                return Some(Dialect::Csv);
            }
        }
        None
    }
}

/// One command expression as written in the source.
///
/// Names are kept as written; resolving them against the command tables is
/// case-insensitive and happens later.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub location: Location,
    pub namespace: String,
    pub command: String,
    pub indices: Vec<String>,
    /// Text after the closing index parenthesis, e.g. `Day.Load`.
    pub suffix: Option<String>,
    pub arguments: Vec<String>,
    /// The argument text before splitting, for free-text commands.
    pub argument_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A bare number: the track position for the following commands.
    /// Kept as text because its meaning depends on the current unit of length.
    Position { location: Location, text: String },
    Command(Expression),
}

impl Statement {
    pub fn location(&self) -> &Location {
        match self {
            Statement::Position { location, .. } => location,
            Statement::Command(e) => &e.location,
        }
    }
}

/// Split preprocessed lines into statements.
pub fn lex(lines: &[SourceLine], dialect: Dialect, sink: &mut dyn DiagnosticSink) -> Vec<Statement> {
    let mut lexer = Lexer {
        dialect,
        sink,
        with_prefix: None,
        section: None,
        statements: Vec::new(),
    };
    for line in lines {
        lexer.line(line);
    }
    lexer.statements
}

/// RW section headers and the namespace each one implies.
fn section_namespace(header: &str) -> Option<&'static str> {
    match header.trim().to_ascii_lowercase().as_str() {
        "options" => Some("Options"),
        "route" => Some("Route"),
        "train" => Some("Train"),
        "object" => Some("Structure"),
        "railway" => Some("Track"),
        "cycle" => Some("Cycle"),
        "signal" => Some("Signal"),
        _ => None,
    }
}

struct Lexer<'s> {
    dialect: Dialect,
    sink: &'s mut dyn DiagnosticSink,
    /// CSV `With` namespace.
    with_prefix: Option<String>,
    /// RW namespace implied by the current section.
    section: Option<&'static str>,
    statements: Vec<Statement>,
}

impl Lexer<'_> {
    fn line(&mut self, line: &SourceLine) {
        match self.dialect {
            Dialect::Csv => {
                for (offset, text) in split_top_level(&line.text) {
                    let at = location_at(line, offset);
                    self.csv_expression(text, at);
                }
            }
            Dialect::Rw => {
                let trimmed = line.text.trim();
                if let Some(header) = trimmed.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                    self.section = section_namespace(header);
                    if self.section.is_none() {
                        self.sink.emit(Diagnostic::warning(
                            DiagnosticKind::UnsupportedCommand,
                            format!("Unknown section [{header}]; its lines are ignored"),
                            location_at(line, 0),
                        ));
                    }
                    return;
                }
                if self.section == Some("Track") {
                    for (offset, text) in split_top_level(&line.text) {
                        let at = location_at(line, offset);
                        self.rw_railway_expression(text, at);
                    }
                } else if let Some(section) = self.section {
                    let offset = line.text.len() - line.text.trim_start().len();
                    let at = location_at(line, offset);
                    self.rw_section_expression(trimmed, section, at);
                }
            }
        }
    }

    fn csv_expression(&mut self, text: &str, at: Location) {
        if text.is_empty() || text.starts_with(';') {
            return;
        }
        if is_position(text) {
            self.push_position(text, at);
            return;
        }
        let lower = text.to_ascii_lowercase();
        if lower == "with" || lower.starts_with("with ") || lower.starts_with("with\t") {
            let namespace = text.get(4..).unwrap_or_default().trim();
            self.with_prefix = (!namespace.is_empty()).then(|| namespace.to_string());
            return;
        }

        let owned;
        let text = match (&self.with_prefix, text.starts_with('.')) {
            (Some(prefix), true) => {
                owned = format!("{prefix}{text}");
                owned.as_str()
            }
            _ => text,
        };

        let parts = split_head(text);
        let arguments = split_arguments(parts.rest, &[';']);
        self.push_command(parts, None, arguments, at);
    }

    fn rw_railway_expression(&mut self, text: &str, at: Location) {
        if text.is_empty() {
            return;
        }
        if is_position(text) {
            self.push_position(text, at);
            return;
        }
        let text = text.strip_prefix('@').unwrap_or(text).trim_start();
        let mut parts = split_head(text);
        // Railway commands carry their arguments in the parentheses.
        let inner = parts.indices.take().unwrap_or_default();
        let arguments = split_arguments(inner, &[',', ';']);
        let parts = HeadParts { rest: inner, ..parts };
        self.push_command(parts, Some("Track"), arguments, at);
    }

    fn rw_section_expression(&mut self, text: &str, section: &'static str, at: Location) {
        let parts = split_head(text);
        let rest = parts.rest.strip_prefix('=').unwrap_or(parts.rest).trim_start();
        let arguments = split_arguments(rest, &[',']);
        let parts = HeadParts { rest, ..parts };
        self.push_command(parts, Some(section), arguments, at);
    }

    fn push_position(&mut self, text: &str, location: Location) {
        self.statements.push(Statement::Position {
            location,
            text: text.to_string(),
        });
    }

    fn push_command(
        &mut self,
        parts: HeadParts<'_>,
        implied: Option<&'static str>,
        arguments: Vec<String>,
        location: Location,
    ) {
        if parts.unclosed {
            self.sink.emit(Diagnostic::warning(
                DiagnosticKind::InvalidArgument,
                format!("Missing closing parenthesis in {}", parts.name),
                location.clone(),
            ));
        }
        let indices = parts
            .indices
            .map(|inner| split_arguments(inner, &[';', ',']))
            .unwrap_or_default();

        let (namespace, command) = match parts.name.split_once('.') {
            Some((ns, cmd)) if !ns.is_empty() => (Some(ns), cmd),
            Some((_, cmd)) => (None, cmd),
            None => (None, parts.name),
        };
        let namespace = namespace.or(implied).unwrap_or_else(|| {
            if command.eq_ignore_ascii_case("signal") && !indices.is_empty() {
                "Signal"
            } else {
                "Track"
            }
        });

        self.statements.push(Statement::Command(Expression {
            location,
            namespace: namespace.to_string(),
            command: command.to_string(),
            indices,
            suffix: parts.suffix.map(str::to_string),
            arguments,
            argument_text: parts.rest.to_string(),
        }));
    }
}

// ── Expression pieces ──────────────────────────────────────────────

struct HeadParts<'a> {
    name: &'a str,
    /// Text inside the parentheses directly after the name.
    indices: Option<&'a str>,
    suffix: Option<&'a str>,
    /// Everything after the head, trimmed.
    rest: &'a str,
    unclosed: bool,
}

/// Split `Name(indices).Suffix rest` into its parts.
fn split_head(text: &str) -> HeadParts<'_> {
    let bytes = text.as_bytes();
    let name_end = bytes
        .iter()
        .position(|&b| b == b'(' || b == b'=' || b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let name = text.get(..name_end).unwrap_or_default();
    let mut pos = name_end;
    let mut indices = None;
    let mut unclosed = false;

    if bytes.get(pos) == Some(&b'(') {
        let mut depth = 0;
        let mut close = None;
        for (i, &b) in bytes.iter().enumerate().skip(pos) {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        match close {
            Some(close) => {
                indices = text.get(pos + 1..close);
                pos = close + 1;
            }
            None => {
                indices = text.get(pos + 1..);
                pos = bytes.len();
                unclosed = true;
            }
        }
    }

    let mut suffix = None;
    if bytes.get(pos) == Some(&b'.') {
        let end = bytes
            .iter()
            .skip(pos)
            .position(|&b| b == b'=' || b.is_ascii_whitespace())
            .map_or(bytes.len(), |rel| pos + rel);
        suffix = text.get(pos + 1..end).filter(|s| !s.is_empty());
        pos = end;
    }

    HeadParts {
        name,
        indices,
        suffix,
        rest: text.get(pos..).unwrap_or_default().trim(),
        unclosed,
    }
}

/// Split on commas at parenthesis depth 0, returning each trimmed piece with
/// the byte offset where its text starts.
fn split_top_level(line: &str) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, b) in line.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = (depth - 1).max(0),
            b',' if depth == 0 => {
                pieces.push(trimmed_piece(line, start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(trimmed_piece(line, start, line.len()));
    pieces
}

fn trimmed_piece(line: &str, start: usize, end: usize) -> (usize, &str) {
    let raw = line.get(start..end).unwrap_or_default();
    let lead = raw.len() - raw.trim_start().len();
    (start + lead, raw.trim())
}

fn split_arguments(text: &str, separators: &[char]) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    text.split(separators).map(|a| a.trim().to_string()).collect()
}

/// A bare, possibly colon-compound, number.
fn is_position(text: &str) -> bool {
    text.bytes().any(|b| b.is_ascii_digit())
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b':' | b'+' | b'-' | b'e' | b'E' | b' '))
        && !text.starts_with(['e', 'E'])
}

fn location_at(line: &SourceLine, offset: usize) -> Location {
    let column = line.text.get(..offset).map_or(1, |p| p.chars().count() + 1);
    Location::new(line.file.clone(), line.line, column)
}
