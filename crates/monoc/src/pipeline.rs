//! Wires the module graph, inference/monomorphization, and textual IR
//! lowering into one driver call, with verbose mode additionally printing
//! per-phase progress and quiet mode suppressing it.

use std::path::{Path, PathBuf};

use monoc_common::diagnostics::DiagnosticSink;
use monoc_common::source::SourceProvider;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

impl LogLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => LogLevel::Verbose,
            (_, true) => LogLevel::Quiet,
            _ => LogLevel::Normal,
        }
    }
}

macro_rules! log_step {
    ($level:expr, $($arg:tt)*) => {
        if $level == LogLevel::Verbose {
            eprintln!($($arg)*);
        }
    };
}

/// Run the full pipeline rooted at `entry`. Returns `None` only when a
/// phase could not produce any IR at all (diagnostics already explain
/// why); the caller distinguishes "no progress" (404) from "diagnostics
/// present after a completed phase" (500) by checking `sink.has_errors()`
/// once this returns.
pub fn compile(
    entry: &Path,
    provider: &mut SourceProvider,
    sink: &mut DiagnosticSink,
    debug: bool,
    debug_mode: bool,
    log: LogLevel,
) -> Option<String> {
    log_step!(log, "monoc: loading module graph from {}", entry.display());
    let graph = monoc_modgraph::load_graph(entry, provider, sink);
    if log == LogLevel::Verbose {
        let modules: Vec<PathBuf> = graph.order.clone();
        eprintln!("monoc: {} module(s) loaded: {:?}", modules.len(), modules);
    }
    if sink.has_errors() {
        return None;
    }

    log_step!(log, "monoc: running type inference and monomorphization");
    let ir = monoc_infer::infer_program(&graph, provider, entry, sink);
    if log == LogLevel::Verbose {
        let names: Vec<&str> = ir.specializations.iter().map(|s| s.mangled_name.as_str()).collect();
        eprintln!("monoc: {} specialization(s): {:?}", names.len(), names);
    }
    if sink.has_errors() {
        return None;
    }

    log_step!(log, "monoc: lowering to textual IR");
    Some(monoc_codegen::emit(&ir, provider, debug, debug_mode))
}
