//! Shared argument readers for the namespace handlers.
//!
//! Centralizes the "missing means default, malformed means diagnostic plus
//! default" rule so every handler reports bad input the same way. Each reader
//! returns `None` when the caller should fall back to its default.

use crate::diagnostics::DiagnosticKind;
use crate::dsl::lexer::Expression;
use crate::dsl::numeric::{parse_double_legacy, parse_int_legacy, parse_length};

use super::handlers::ParseContext;

impl ParseContext<'_> {
    /// Argument `i` as written, or `None` when absent or blank.
    pub fn arg_text<'e>(&self, expr: &'e Expression, i: usize) -> Option<&'e str> {
        expr.arguments
            .get(i)
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
    }

    /// Argument `i` that the command cannot do without.
    pub fn required_text<'e>(&mut self, expr: &'e Expression, i: usize, what: &str) -> Option<&'e str> {
        let text = self.arg_text(expr, i);
        if text.is_none() {
            self.error(
                DiagnosticKind::InvalidArgument,
                format!("{what} is missing in {}", expr.command),
                &expr.location,
            );
        }
        text
    }

    pub fn arg_double(&mut self, expr: &Expression, i: usize, what: &str) -> Option<f64> {
        let text = self.arg_text(expr, i)?;
        let value = parse_double_legacy(text);
        if value.is_none() {
            self.malformed(expr, what, text);
        }
        value
    }

    pub fn arg_int(&mut self, expr: &Expression, i: usize, what: &str) -> Option<i32> {
        let text = self.arg_text(expr, i)?;
        let value = parse_int_legacy(text);
        if value.is_none() {
            self.malformed(expr, what, text);
        }
        value
    }

    /// A length scaled by the current unit-of-length factors.
    pub fn arg_length(&mut self, expr: &Expression, i: usize, what: &str, units: &[f64]) -> Option<f64> {
        let text = self.arg_text(expr, i)?;
        let value = parse_length(text, units);
        if value.is_none() {
            self.malformed(expr, what, text);
        }
        value
    }

    /// A `0`/`1` switch.
    pub fn arg_flag(&mut self, expr: &Expression, i: usize, what: &str) -> Option<bool> {
        match self.arg_int(expr, i, what)? {
            0 => Some(false),
            1 => Some(true),
            other => {
                self.error(
                    DiagnosticKind::InvalidArgument,
                    format!("{what} must be 0 or 1, not {other}"),
                    &expr.location,
                );
                None
            }
        }
    }

    /// A non-negative integer argument (rail number, count).
    pub fn arg_count(&mut self, expr: &Expression, i: usize, what: &str) -> Option<usize> {
        let value = self.arg_int(expr, i, what)?;
        match usize::try_from(value) {
            Ok(v) => Some(v),
            Err(_) => {
                self.error(
                    DiagnosticKind::IndexOutOfRange,
                    format!("{what} must not be negative"),
                    &expr.location,
                );
                None
            }
        }
    }

    /// A structure index argument that must refer to something already declared.
    pub fn arg_declared(
        &mut self,
        expr: &Expression,
        i: usize,
        what: &str,
        declared: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        let index = self.arg_count(expr, i, what)?;
        if declared(index) {
            Some(index)
        } else {
            self.error(
                DiagnosticKind::IndexOutOfRange,
                format!("{what} {index} has not been declared"),
                &expr.location,
            );
            None
        }
    }

    /// Index `i` inside the parentheses. Missing or malformed → diagnostic.
    /// Negative values pass through for the caller's table to reject.
    pub fn index(&mut self, expr: &Expression, i: usize, what: &str) -> Option<i64> {
        let Some(text) = expr.indices.get(i).map(|t| t.trim()).filter(|t| !t.is_empty()) else {
            self.error(
                DiagnosticKind::InvalidArgument,
                format!("{what} is missing in {}", expr.command),
                &expr.location,
            );
            return None;
        };
        let value = parse_int_legacy(text);
        if value.is_none() {
            self.malformed(expr, what, text);
        }
        value.map(i64::from)
    }

    /// Index `i` that must be non-negative.
    pub fn index_usize(&mut self, expr: &Expression, i: usize, what: &str) -> Option<usize> {
        let value = self.index(expr, i, what)?;
        match usize::try_from(value) {
            Ok(v) => Some(v),
            Err(_) => {
                self.error(
                    DiagnosticKind::IndexOutOfRange,
                    format!("{what} {value} is negative"),
                    &expr.location,
                );
                None
            }
        }
    }

    fn malformed(&mut self, expr: &Expression, what: &str, text: &str) {
        self.error(
            DiagnosticKind::MalformedLiteral,
            format!("{what} '{text}' in {} is not a valid number", expr.command),
            &expr.location,
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::path::Path;

    use crate::diagnostics::{Diagnostics, DiagnosticKind};
    use crate::loader::mock::MockLoader;
    use crate::registry::handlers::testing::expr;
    use crate::registry::handlers::ParseContext;
    use crate::settings::RouteSettings;

    fn with_ctx(f: impl FnOnce(&mut ParseContext<'_>)) -> Diagnostics {
        let loader = MockLoader::new();
        let settings = RouteSettings::default();
        let mut sink = Diagnostics::new();
        {
            let mut ctx = ParseContext::new(&loader, &mut sink, &settings, Path::new("/r"));
            f(&mut ctx);
        }
        sink
    }

    #[test]
    fn missing_argument_is_silent() {
        let e = expr("Track", "Pitch", &[], &[]);
        let sink = with_ctx(|ctx| assert_eq!(ctx.arg_double(&e, 0, "Pitch"), None));
        assert!(sink.is_empty());
    }

    #[test]
    fn malformed_argument_reports_once() {
        let e = expr("Track", "Pitch", &[], &["abc"]);
        let sink = with_ctx(|ctx| assert_eq!(ctx.arg_double(&e, 0, "Pitch"), None));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].kind, DiagnosticKind::MalformedLiteral);
    }

    #[test]
    fn lengths_use_units() {
        let e = expr("Track", "Height", &[], &["2"]);
        let sink = with_ctx(|ctx| assert_eq!(ctx.arg_length(&e, 0, "Height", &[0.3048]), Some(0.6096)));
        assert!(sink.is_empty());
    }

    #[test]
    fn flags_accept_only_zero_and_one() {
        let e = expr("Options", "CantBehavior", &[], &["2"]);
        let sink = with_ctx(|ctx| assert_eq!(ctx.arg_flag(&e, 0, "CantBehavior"), None));
        assert_eq!(sink.entries()[0].kind, DiagnosticKind::InvalidArgument);
    }

    #[test]
    fn declared_check() {
        let e = expr("Track", "Ground", &[], &["4"]);
        let sink = with_ctx(|ctx| {
            assert_eq!(ctx.arg_declared(&e, 0, "Ground", |i| i == 4), Some(4));
            assert_eq!(ctx.arg_declared(&e, 0, "Ground", |_| false), None);
        });
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].kind, DiagnosticKind::IndexOutOfRange);
    }

    #[test]
    fn indices() {
        let e = expr("Structure", "Rail", &["-2"], &["a.csv"]);
        let sink = with_ctx(|ctx| {
            assert_eq!(ctx.index(&e, 0, "Rail index"), Some(-2));
            assert_eq!(ctx.index_usize(&e, 0, "Rail index"), None);
            assert_eq!(ctx.index(&e, 1, "Second index"), None);
        });
        assert_eq!(sink.len(), 2);
    }
}
