//! Line-level preprocessing: comments, continuation lines and the `$`
//! directives (`$Include`, `$Chr`, `$Rnd`, `$Sub`, `$If`/`$Else`/`$EndIf`).
//!
//! Included files are spliced in depth-first, so the lexer sees one flat list
//! of lines in which every line still remembers the file it came from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Location};
use crate::loader::{Encoding, ResourceLoader};
use crate::paths;

use super::lexer::Dialect;
use super::numeric::{parse_double_legacy, parse_int_legacy};

/// A physical (or continuation-joined) line after preprocessing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub file: String,
    /// 1-based line number of the first physical line.
    pub line: usize,
    pub text: String,
}

/// Lines joined while parentheses stay open, at most this many.
const MAX_CONTINUATION_LINES: usize = 16;
/// Guards against `$Sub` values that expand to themselves.
const MAX_SUBSTITUTIONS: usize = 1000;

struct Conditional {
    /// Whether the enclosing region is active.
    parent_active: bool,
    condition: bool,
    in_else: bool,
}

impl Conditional {
    fn active(&self) -> bool {
        self.parent_active && (self.condition != self.in_else)
    }
}

pub struct Preprocessor<'a> {
    loader: &'a dyn ResourceLoader,
    sink: &'a mut dyn DiagnosticSink,
    dialect: Dialect,
    base_folder: PathBuf,
    encoding: Encoding,
    max_depth: usize,
    rng: StdRng,
    subs: HashMap<i32, String>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(
        loader: &'a dyn ResourceLoader,
        sink: &'a mut dyn DiagnosticSink,
        dialect: Dialect,
        base_folder: &Path,
        encoding: Encoding,
        max_depth: usize,
        seed: u64,
    ) -> Self {
        Self {
            loader,
            sink,
            dialect,
            base_folder: base_folder.to_path_buf(),
            encoding,
            max_depth,
            rng: StdRng::seed_from_u64(seed),
            subs: HashMap::new(),
        }
    }

    /// Preprocess the text of the main route file.
    pub fn run(&mut self, text: &str, file: &str) -> Vec<SourceLine> {
        let mut out = Vec::new();
        self.process(text, file, 0, &mut out);
        out
    }

    fn process(&mut self, text: &str, file: &str, depth: usize, out: &mut Vec<SourceLine>) {
        let physical: Vec<&str> = text.lines().collect();
        let mut conditionals: Vec<Conditional> = Vec::new();
        let mut i = 0;
        while i < physical.len() {
            let first_line = i + 1;
            let mut joined = physical.get(i).map_or(String::new(), |l| self.strip_comment(l));
            i += 1;
            let mut extra = 0;
            while paren_depth(&joined) > 0 && extra < MAX_CONTINUATION_LINES && i < physical.len() {
                let next = physical.get(i).map_or(String::new(), |l| self.strip_comment(l));
                joined.push(' ');
                joined.push_str(next.trim());
                i += 1;
                extra += 1;
            }

            let at = Location::new(file, first_line, 1);
            let trimmed = joined.trim();
            if trimmed.is_empty() {
                continue;
            }
            let lower = trimmed.to_ascii_lowercase();
            let active = conditionals.last().map_or(true, Conditional::active);

            if lower.starts_with("$if(") {
                let condition = if active {
                    let expanded = self.substitute(trimmed, &at);
                    self.evaluate_condition(&expanded, &at)
                } else {
                    false
                };
                conditionals.push(Conditional {
                    parent_active: active,
                    condition,
                    in_else: false,
                });
                continue;
            }
            if lower.starts_with("$else(") {
                match conditionals.last_mut() {
                    Some(c) if !c.in_else => c.in_else = true,
                    _ => self.report(at, "$Else without a matching $If"),
                }
                continue;
            }
            if lower.starts_with("$endif(") {
                if conditionals.pop().is_none() {
                    self.report(at, "$EndIf without a matching $If");
                }
                continue;
            }
            if !active {
                continue;
            }

            if lower.starts_with("$include(") {
                self.include(trimmed, &at, depth, out);
                continue;
            }
            if lower.starts_with("$sub(") {
                if let Some((index, value)) = split_assignment(trimmed) {
                    let value = self.substitute(value, &at);
                    match parse_int_legacy(index) {
                        Some(n) if n >= 0 => {
                            self.subs.insert(n, value.trim().to_string());
                        }
                        _ => self.report(at, format!("$Sub index {index} is invalid")),
                    }
                    continue;
                }
            }

            let text = self.substitute(trimmed, &at);
            out.push(SourceLine {
                file: file.to_string(),
                line: first_line,
                text,
            });
        }

        if !conditionals.is_empty() {
            self.report(
                Location::new(file, physical.len(), 1),
                "$If is missing its $EndIf",
            );
        }
    }

    fn strip_comment(&self, line: &str) -> String {
        let mut end = line.len();
        if let Some(pos) = line.find("//") {
            end = end.min(pos);
        }
        if self.dialect == Dialect::Rw {
            if let Some(pos) = line.find(';') {
                end = end.min(pos);
            }
        }
        line.get(..end).unwrap_or(line).to_string()
    }

    fn include(&mut self, directive: &str, at: &Location, depth: usize, out: &mut Vec<SourceLine>) {
        if depth >= self.max_depth {
            self.report(at.clone(), "$Include is nested too deeply and was ignored");
            return;
        }
        let directive = self.substitute(directive, at);
        let Some(inner) = paren_contents(&directive) else {
            self.report(at.clone(), "$Include is missing its closing parenthesis");
            return;
        };
        let Some(reference) = self.pick_include(inner) else {
            self.report(at.clone(), "$Include names no file");
            return;
        };
        let Some(path) = paths::combine(&self.base_folder, &reference) else {
            self.report(at.clone(), format!("$Include reference {reference} is not a valid path"));
            return;
        };
        if !self.loader.file_exists(&path) {
            self.sink.emit(Diagnostic::missing(
                format!("Include file {} was not found", path.display()),
                at.clone(),
            ));
            return;
        }
        match self.loader.read_text(&path, self.encoding) {
            Ok(text) => {
                let name = path.display().to_string();
                self.process(&text, &name, depth + 1, out);
            }
            Err(e) => {
                self.sink.emit(Diagnostic::missing(
                    format!("Include file could not be read: {e}"),
                    at.clone(),
                ));
            }
        }
    }

    /// `$Include(a)` or weighted `$Include(a;2;b;1)`.
    fn pick_include(&mut self, inner: &str) -> Option<String> {
        let parts: Vec<&str> = inner
            .split([';', ','])
            .map(str::trim)
            .collect();
        let mut candidates: Vec<(String, f64)> = Vec::new();
        for pair in parts.chunks(2) {
            let Some(file) = pair.first().filter(|f| !f.is_empty()) else {
                continue;
            };
            let weight = pair
                .get(1)
                .and_then(|w| parse_double_legacy(w))
                .unwrap_or(1.0)
                .max(0.0);
            candidates.push(((*file).to_string(), weight));
        }
        let total: f64 = candidates.iter().map(|(_, w)| w).sum();
        if candidates.len() <= 1 || total <= 0.0 {
            return candidates.into_iter().next().map(|(f, _)| f);
        }
        let mut roll = self.rng.gen::<f64>() * total;
        for (file, weight) in &candidates {
            if roll < *weight {
                return Some(file.clone());
            }
            roll -= weight;
        }
        candidates.pop().map(|(f, _)| f)
    }

    fn evaluate_condition(&mut self, directive: &str, at: &Location) -> bool {
        let Some(inner) = paren_contents(directive) else {
            self.report(at.clone(), "$If is missing its closing parenthesis");
            return false;
        };
        match parse_double_legacy(inner) {
            Some(v) => v != 0.0,
            None => {
                self.report(at.clone(), format!("$If condition {inner} is not a number"));
                false
            }
        }
    }

    /// Expand `$Chr`, `$Rnd` and `$Sub` reads, innermost first.
    fn substitute(&mut self, line: &str, at: &Location) -> String {
        let mut text = line.to_string();
        for _ in 0..MAX_SUBSTITUTIONS {
            let lower = text.to_ascii_lowercase();
            let Some(start) = ["$chr(", "$rnd(", "$sub("]
                .iter()
                .filter_map(|p| lower.rfind(p))
                .max()
            else {
                return text;
            };
            let open = start + 4;
            let Some(close) = text
                .get(open..)
                .and_then(|rest| rest.find(')'))
                .map(|rel| open + rel)
            else {
                self.report(at.clone(), "Directive is missing its closing parenthesis");
                return text;
            };
            let name = lower.get(start + 1..open).unwrap_or_default().to_string();
            let inner = text.get(open + 1..close).unwrap_or_default().to_string();
            let replacement = match name.as_str() {
                "chr" => self.expand_chr(&inner, at),
                "rnd" => self.expand_rnd(&inner, at),
                _ => self.expand_sub(&inner, at),
            };
            text.replace_range(start..=close, &replacement);
        }
        self.report(at.clone(), "Too many nested substitutions; expansion stopped");
        text
    }

    fn expand_chr(&mut self, inner: &str, at: &Location) -> String {
        match parse_int_legacy(inner) {
            Some(n @ (10 | 13 | 20..=127)) => char::from_u32(n.unsigned_abs())
                .map(String::from)
                .unwrap_or_default(),
            _ => {
                self.report(at.clone(), format!("$Chr({inner}) is outside the allowed range"));
                String::new()
            }
        }
    }

    fn expand_rnd(&mut self, inner: &str, at: &Location) -> String {
        let bounds: Vec<Option<i32>> = inner.split([';', ',']).map(parse_int_legacy).collect();
        match bounds.as_slice() {
            [Some(a), Some(b)] => {
                let (lo, hi) = if a <= b { (*a, *b) } else { (*b, *a) };
                self.rng.gen_range(lo..=hi).to_string()
            }
            _ => {
                self.report(at.clone(), format!("$Rnd({inner}) needs two integer bounds"));
                String::new()
            }
        }
    }

    fn expand_sub(&mut self, inner: &str, at: &Location) -> String {
        let value = parse_int_legacy(inner).and_then(|n| self.subs.get(&n).cloned());
        value.unwrap_or_else(|| {
            self.report(at.clone(), format!("$Sub({inner}) has not been assigned"));
            String::new()
        })
    }

    fn report(&mut self, at: Location, message: impl Into<String>) {
        self.sink
            .emit(Diagnostic::error(DiagnosticKind::Preprocessor, message, at));
    }
}

/// Net count of unclosed parentheses.
fn paren_depth(text: &str) -> i32 {
    text.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// The text between the first `(` and its matching `)`.
fn paren_contents(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let mut depth = 0;
    for (i, c) in text.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return text.get(open + 1..i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split `$Sub(n) = value` into `("n", "value")`.
fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let index = paren_contents(text)?;
    let close = text.find(')')?;
    let rest = text.get(close + 1..)?.trim_start();
    let value = rest.strip_prefix('=')?;
    Some((index, value))
}
