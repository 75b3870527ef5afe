//! Shared types for the monoc compiler: source spans, the diagnostic sink,
//! and the source provider.
//!
//! # Architecture
//!
//! - [`span`]: byte-offset spans and line/column lookup
//! - [`diagnostics`]: coded, located diagnostics and the collecting sink
//! - [`source`]: source file cache keyed by canonical path

pub mod diagnostics;
pub mod source;
pub mod span;
pub mod token;

pub use diagnostics::{codes, Diagnostic, DiagnosticSink, Severity, SeverityCounts};
pub use source::{SourceFile, SourceProvider};
pub use span::{LineIndex, Span};
pub use token::{Token, TokenKind};
