//! Textual IR code generation: lowers a typed, monomorphized program to a
//! single textual IR module.

pub mod codegen;
pub mod ir;
pub mod runtime;
pub mod strings;

use monoc_common::source::SourceProvider;
use monoc_infer::ProgramIr;

/// Render `ir` as one textual IR document, its final form being whatever
/// the driver writes to the `-o` path.
pub fn emit(ir: &ProgramIr, provider: &SourceProvider, debug: bool, debug_mode: bool) -> String {
    codegen::generate(ir, provider, debug, debug_mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use monoc_common::diagnostics::DiagnosticSink;

    fn compile(source: &str) -> String {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.ml");
        fs::write(&entry, source).unwrap();

        let mut provider = SourceProvider::new();
        let mut sink = DiagnosticSink::new();
        let graph = monoc_modgraph::load_graph(&entry, &mut provider, &mut sink);
        let canonical: PathBuf = provider.load(&entry).unwrap();
        assert!(!sink.has_errors(), "{:?}", sink.render_all());
        let ir = monoc_infer::infer_program(&graph, &provider, &canonical, &mut sink);
        assert!(!sink.has_errors(), "{:?}", sink.render_all());
        emit(&ir, &provider, false, false)
    }

    #[test]
    fn emits_one_function_per_specialization_and_a_main() {
        let out = compile(
            r#"
            function add(a, b) {
                return a + b;
            }
            var i = add(1, 2);
            var d = add(1.5, 2.5);
            console.log(i);
            "#,
        );
        assert!(out.contains("define i32 @add_int_int"));
        assert!(out.contains("define double @add_double_double"));
        assert!(out.contains("define i32 @main()"));
        assert!(out.contains("call void @print_int"));
    }

    #[test]
    fn struct_literal_lowers_to_malloc_and_field_stores() {
        let out = compile(
            r#"
            struct Vec2 {
                x: double,
                y: double = 0.0,
            }
            var v = Vec2(1.0);
            "#,
        );
        assert!(out.contains("%struct.Vec2 = type { double, double }"));
        assert!(out.contains("call i8* @malloc"));
    }

    #[test]
    fn string_concat_inserts_a_canonical_conversion() {
        let out = compile(
            r#"
            var s = "total: " + 3;
            console.log(s);
            "#,
        );
        assert!(out.contains("call %String* @strconv_int"));
        assert!(out.contains("call %String* @strcat_str_str"));
    }

    #[test]
    fn first_class_function_call_dispatches_to_the_bound_specialization() {
        let out = compile(
            r#"
            function square(x) {
                return x * x;
            }
            var f = square;
            var result = f(4);
            "#,
        );
        assert!(out.contains("define i32 @square_int"));
        assert!(out.contains("call i32 @square_int"));
    }

    #[test]
    fn debug_info_emits_dbg_comments_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.ml");
        fs::write(&entry, "var x = 1;\n").unwrap();
        let mut provider = SourceProvider::new();
        let mut sink = DiagnosticSink::new();
        let graph = monoc_modgraph::load_graph(&entry, &mut provider, &mut sink);
        let canonical = provider.load(&entry).unwrap();
        let ir = monoc_infer::infer_program(&graph, &provider, &canonical, &mut sink);
        let out = emit(&ir, &provider, true, false);
        assert!(out.contains("; dbg"));
    }
}
