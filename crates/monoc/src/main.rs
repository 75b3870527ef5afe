//! The `monoc` compiler CLI.
//!
//! Runs the whole pipeline — module loading, inference and
//! monomorphization, textual IR lowering — and reports diagnostics one
//! line per diagnostic, followed by a summary line and an exit code chosen
//! from the driver's exit-code contract.

use std::path::PathBuf;

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::Parser;

use monoc::pipeline;
use monoc_common::diagnostics::{DiagnosticSink, Severity};
use monoc_common::source::SourceProvider;

#[derive(Parser)]
#[command(name = "monoc", version, about = "The monoc compiler")]
struct Cli {
    /// Input source file.
    input: PathBuf,

    /// Output IR path.
    #[arg(short = 'o', long = "output", default_value = "output.ll")]
    output: PathBuf,

    /// Emit source-location debug info (`; dbg` comments) in the IR.
    #[arg(short = 'g', long = "debug")]
    debug: bool,

    /// Enable the runtime's assertion built-ins.
    #[arg(short = 'd', long = "debug-mode")]
    debug_mode: bool,

    /// Print per-phase progress (module list, specialization table).
    #[arg(short = 'v', long = "verbose", conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress non-error progress output.
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

// Exit codes above 255 can't be represented by `std::process::ExitCode`
// (a `u8` newtype), so this calls `std::process::exit` directly — fine
// for a one-shot batch process with no cleanup to run after exit.
fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let mut provider = SourceProvider::new();
    let entry = match provider.load(&cli.input) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("monoc: could not read '{}': {err}", cli.input.display());
            return monoc::exit_code(false, false);
        }
    };

    let mut sink = DiagnosticSink::new();
    let log = pipeline::LogLevel::from_flags(cli.verbose, cli.quiet);

    let ir_text = pipeline::compile(&entry, &mut provider, &mut sink, cli.debug, cli.debug_mode, log);

    render_diagnostics(&provider, &sink);
    eprintln!("{}", sink.summary_line());

    match ir_text {
        Some(text) if !sink.has_errors() => match std::fs::write(&cli.output, text) {
            Ok(()) => monoc::exit_code(true, false),
            Err(err) => {
                eprintln!("monoc: could not write '{}': {err}", cli.output.display());
                monoc::exit_code(false, false)
            }
        },
        _ => monoc::exit_code(false, sink.has_errors()),
    }
}

/// Render every collected diagnostic, `[SEVERITY:CODE] file:line:col: msg`,
/// using `ariadne` for the underlying span-highlighted report.
fn render_diagnostics(provider: &SourceProvider, sink: &DiagnosticSink) {
    for diagnostic in sink.all() {
        eprintln!("{diagnostic}");

        let path = PathBuf::from(&diagnostic.file);
        let Some(source) = provider.get(&path) else { continue };
        let kind = match diagnostic.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
            Severity::Info | Severity::Hint => ReportKind::Advice,
        };
        let color = match diagnostic.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
            Severity::Info | Severity::Hint => Color::Blue,
        };
        let offset = source.line_index.offset_of(diagnostic.line, diagnostic.col);
        let span = offset..offset + 1;
        let _ = Report::<std::ops::Range<usize>>::build(kind, span.clone())
            .with_message(&diagnostic.message)
            .with_label(Label::new(span).with_message(&diagnostic.message).with_color(color))
            .finish()
            .eprint(Source::from(&source.text));
    }
}
