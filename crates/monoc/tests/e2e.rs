//! End-to-end scenarios for the `monoc` driver.
//!
//! These call `monoc::pipeline::compile` directly rather than spawning a
//! built binary: the downstream toolchain that would actually execute the
//! emitted IR is an out-of-scope collaborator, so there is no real
//! program's stdout to shell out for, and a fast in-process call exercises
//! exactly the same driver code the CLI calls into.

use std::path::{Path, PathBuf};

use monoc::pipeline::{self, LogLevel};
use monoc_common::diagnostics::DiagnosticSink;
use monoc_common::source::SourceProvider;

fn read_fixture(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).parent().unwrap().parent().unwrap().join("demos").join(name)
}

struct Run {
    ir: Option<String>,
    sink: DiagnosticSink,
    exit_code: i32,
}

fn run_monoc(fixture: &str, debug: bool, debug_mode: bool) -> Run {
    let input = read_fixture(fixture);
    let mut provider = SourceProvider::new();
    let mut sink = DiagnosticSink::new();
    let entry = provider.load(&input).expect("fixture should be readable");
    let ir = pipeline::compile(&entry, &mut provider, &mut sink, debug, debug_mode, LogLevel::Normal);
    let exit_code = monoc::exit_code(ir.is_some() && !sink.has_errors(), sink.has_errors());
    Run { ir, sink, exit_code }
}

impl Run {
    fn rendered(&self) -> String {
        self.sink.render_all().join("\n")
    }
}

#[test]
fn s1_arithmetic_specialization_produces_two_specializations() {
    let run = run_monoc("arithmetic_specialization.ml", false, false);
    assert_eq!(run.exit_code, 0, "{}", run.rendered());
    let ir = run.ir.unwrap();
    assert!(ir.contains("define i32 @add_int_int"));
    assert!(ir.contains("define double @add_double_double"));
    assert!(ir.contains("call void @print_int"));
    assert!(ir.contains("call void @print_double"));
}

#[test]
fn s2_recursive_specialization_produces_one_specialization() {
    let run = run_monoc("recursive_specialization.ml", false, false);
    assert_eq!(run.exit_code, 0, "{}", run.rendered());
    let ir = run.ir.unwrap();
    assert_eq!(ir.matches("define i32 @fib_int").count(), 1);
    assert!(ir.contains("call i32 @fib_int"));
}

#[test]
fn s3_string_vs_numeric_overload_specializes_separately() {
    let run = run_monoc("string_vs_numeric_overload.ml", false, false);
    assert_eq!(run.exit_code, 0, "{}", run.rendered());
    let ir = run.ir.unwrap();
    assert!(ir.contains("define i32 @g_int"));
    assert!(ir.contains("define %String* @g_str"));
    assert!(ir.contains("call %String* @strcat_str_str"));
}

#[test]
fn s4_cyclic_import_is_one_error_exit_500_no_ir() {
    let run = run_monoc("cyclic_import/a.ml", false, false);
    assert_eq!(run.exit_code, 500);
    assert!(run.ir.is_none());
    let rendered = run.rendered();
    assert!(rendered.contains("T300"));
    assert_eq!(rendered.matches("T300").count(), 1, "cycle should be reported once:\n{rendered}");
}

#[test]
fn s5_undefined_variable_is_t301_exit_500() {
    let run = run_monoc("undefined_variable.ml", false, false);
    assert_eq!(run.exit_code, 500);
    assert!(run.ir.is_none());
    let rendered = run.rendered();
    assert!(rendered.contains("[ERROR:T301]"));
    assert!(rendered.contains("Undefined variable: xyz"));
}

#[test]
fn s6_const_array_size_stack_allocates() {
    let run = run_monoc("const_array_size.ml", false, false);
    assert_eq!(run.exit_code, 0, "{}", run.rendered());
    let ir = run.ir.unwrap();
    assert!(ir.contains("alloca [3 x i32]"));
}

#[test]
fn s6_negative_const_array_size_is_t313() {
    let run = run_monoc("const_array_negative_size.ml", false, false);
    assert_eq!(run.exit_code, 500);
    assert!(run.ir.is_none());
    assert!(run.rendered().contains("T313"));
}

#[test]
fn s6_self_referencing_const_array_size_is_t315() {
    let run = run_monoc("const_array_self_referencing_size.ml", false, false);
    assert_eq!(run.exit_code, 500);
    assert!(run.ir.is_none());
    assert!(run.rendered().contains("T315"));
}

#[test]
fn missing_input_file_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.ml");
    let mut provider = SourceProvider::new();
    let load_result = provider.load(&missing);
    assert!(load_result.is_err());
    assert_eq!(monoc::exit_code(false, false), 404);
}

#[test]
fn debug_flag_emits_dbg_comments() {
    let run = run_monoc("arithmetic_specialization.ml", true, false);
    assert_eq!(run.exit_code, 0, "{}", run.rendered());
    assert!(run.ir.unwrap().contains("; dbg"));
}

#[test]
fn debug_mode_flag_declares_assertion_builtins() {
    let run = run_monoc("arithmetic_specialization.ml", false, true);
    assert_eq!(run.exit_code, 0, "{}", run.rendered());
    assert!(run.ir.unwrap().contains("declare void @assert_bounds"));
}

#[test]
fn exit_code_maps_success_failure_and_no_progress() {
    assert_eq!(monoc::exit_code(true, false), 0);
    assert_eq!(monoc::exit_code(true, true), 500);
    assert_eq!(monoc::exit_code(false, true), 500);
    assert_eq!(monoc::exit_code(false, false), 404);
}
