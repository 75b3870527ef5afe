//! The diagnostic sink: an append-only, coded, located message log.
//!
//! Every phase of the pipeline pushes into one [`DiagnosticSink`]. The sink
//! never transforms or drops a diagnostic once pushed — phases decide
//! whether to keep going by calling [`DiagnosticSink::has_errors`] between
//! phases, collecting and reporting rather than aborting on the first
//! diagnostic.

use std::fmt;

use crate::span::{LineIndex, Span};

/// Severity of a single diagnostic. Ordered so that `Error` sorts highest,
/// matching how `has_errors` and the summary line treat them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Hint,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Hint => "HINT",
        };
        write!(f, "{s}")
    }
}

/// Diagnostic codes used across the pipeline.
///
/// `E2xx` codes originate in the parser; `T3xx` codes originate in the
/// module graph, type system, const evaluator, and inference engine. The
/// assignments below are this compiler's own and are recorded as an Open
/// Question resolution in DESIGN.md.
pub mod codes {
    /// Generic parser syntax error (all parser diagnostics use this family;
    /// the parser is a collaborator and does not subdivide further).
    pub const E_SYNTAX: &str = "E200";

    /// A module import cycle was detected.
    pub const T_CYCLIC_IMPORT: &str = "T300";
    /// An identifier could not be resolved: unbound variable, or a name
    /// imported from a module that failed to load.
    pub const T_UNDEFINED_NAME: &str = "T301";
    /// A member or index access does not resolve against the receiver's
    /// descriptor.
    pub const T_UNKNOWN_PROPERTY: &str = "T303";
    /// A call site's argument count does not match the callee's arity.
    pub const T_ARITY_MISMATCH: &str = "T305";
    /// Two types that must be equal (or joined) are not compatible.
    pub const T_TYPE_MISMATCH: &str = "T307";
    /// A binding's assignments within its scope do not join to one type;
    /// the earliest conflicting assignment is reported.
    pub const T_REASSIGNMENT_CONFLICT: &str = "T311";
    /// `==`/`!=` used between mismatched non-numeric types.
    pub const T_INCOMPARABLE_TYPES: &str = "T312";
    /// A const-evaluator arithmetic error: division by zero or signed
    /// overflow.
    pub const T_CONST_EVAL_ARITHMETIC: &str = "T313";
    /// A non-positive array size was used where a positive constant is
    /// required.
    pub const T_CONST_ARRAY_SIZE: &str = "T314";
    /// A const binding's value is unreachable without revisiting itself
    /// (a dependency cycle among const declarations).
    pub const T_CONST_CYCLE: &str = "T315";
    /// The specialization-discovery fixed point failed to converge within
    /// the safety bound (internal error).
    pub const T_FIXED_POINT_DIVERGED: &str = "T390";
}

/// A single, located, coded compiler message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}] {}:{}:{}: {}",
            self.severity, self.code, self.file, self.line, self.col, self.message
        )
    }
}

/// Counts of diagnostics by severity, used for the post-run summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub hints: usize,
}

/// Collects diagnostics across all compiler phases.
///
/// The sink is append-only and is consulted, never mutated in place, by
/// later phases: nothing reinterprets or removes a diagnostic once pushed.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }

    /// Push a diagnostic, resolving its (line, col) from a byte span via the
    /// given [`LineIndex`] for `source`.
    pub fn push_at(
        &mut self,
        severity: Severity,
        code: &'static str,
        file: impl Into<String>,
        index: &LineIndex,
        span: Span,
        message: impl Into<String>,
    ) {
        let (line, col) = index.line_col(span.start);
        self.diagnostics.push(Diagnostic {
            severity,
            code,
            file: file.into(),
            line,
            col,
            message: message.into(),
        });
    }

    /// Push a diagnostic whose location is already resolved.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for d in &self.diagnostics {
            match d.severity {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => counts.infos += 1,
                Severity::Hint => counts.hints += 1,
            }
        }
        counts
    }

    /// Render every diagnostic as `[SEVERITY:CODE] file:line:col: message`,
    /// in push order (phase order, then source-traversal order within a
    /// phase).
    pub fn render_all(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.to_string()).collect()
    }

    /// The one-line severity summary appended after a compile run.
    pub fn summary_line(&self) -> String {
        let c = self.counts();
        format!(
            "{} error(s), {} warning(s), {} info(s), {} hint(s)",
            c.errors, c.warnings, c.infos, c.hints
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_spec_format() {
        let index = LineIndex::new("let x = 1;\nlet y = xyz;\n");
        let mut sink = DiagnosticSink::new();
        sink.push_at(
            Severity::Error,
            codes::T_UNDEFINED_NAME,
            "main.ml",
            &index,
            Span::new(19, 22),
            "Undefined variable: xyz",
        );
        let rendered = sink.render_all();
        assert_eq!(
            rendered[0],
            "[ERROR:T301] main.ml:2:9: Undefined variable: xyz"
        );
    }

    #[test]
    fn has_errors_only_true_for_error_severity() {
        let index = LineIndex::new("x");
        let mut sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        sink.push_at(Severity::Warning, codes::T_TYPE_MISMATCH, "f", &index, Span::point(0), "w");
        assert!(!sink.has_errors());
        sink.push_at(Severity::Error, codes::T_TYPE_MISMATCH, "f", &index, Span::point(0), "e");
        assert!(sink.has_errors());
    }

    #[test]
    fn counts_tally_by_severity() {
        let index = LineIndex::new("x");
        let mut sink = DiagnosticSink::new();
        sink.push_at(Severity::Error, codes::T_TYPE_MISMATCH, "f", &index, Span::point(0), "a");
        sink.push_at(Severity::Error, codes::T_TYPE_MISMATCH, "f", &index, Span::point(0), "b");
        sink.push_at(Severity::Warning, codes::T_TYPE_MISMATCH, "f", &index, Span::point(0), "c");
        let counts = sink.counts();
        assert_eq!(counts.errors, 2);
        assert_eq!(counts.warnings, 1);
    }
}
