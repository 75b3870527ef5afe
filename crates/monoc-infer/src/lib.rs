//! Type inference and specialization discovery — the hard part.
//!
//! [`infer_program`] drives the whole fixed point: it collects module-level
//! consts and struct definitions (Phase 0), registers every function
//! signature (Phase 1), then repeatedly walks the entry module's top level
//! and every discovered specialization's body until a full pass produces no
//! new specialization and no return-type change (Phase 2..N).

pub mod engine;
pub mod mangle;
pub mod specialize;
pub mod typed_ast;

use std::path::Path;

use monoc_common::diagnostics::DiagnosticSink;
use monoc_common::source::SourceProvider;
use monoc_modgraph::ModuleGraph;

pub use engine::ProgramIr;
pub use specialize::{FirstClassFn, FuncKey, Specialization};
pub use typed_ast::{TypedBlock, TypedExpr, TypedExprKind, TypedStmt};

/// Run type inference and specialization discovery over an already-loaded
/// module graph, rooted at `entry`.
pub fn infer_program(graph: &ModuleGraph, provider: &SourceProvider, entry: &Path, sink: &mut DiagnosticSink) -> ProgramIr {
    engine::Engine::new(graph, provider, entry, sink).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn compile(source: &str) -> (ProgramIr, DiagnosticSink, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.ml");
        fs::write(&entry, source).unwrap();

        let mut provider = SourceProvider::new();
        let mut sink = DiagnosticSink::new();
        let graph = monoc_modgraph::load_graph(&entry, &mut provider, &mut sink);
        let canonical = provider.load(&entry).unwrap();
        let ir = infer_program(&graph, &provider, &canonical, &mut sink);
        (ir, sink, canonical)
    }

    #[test]
    fn specializes_arithmetic_function_per_call_site() {
        let (ir, sink, _) = compile(
            r#"
            function add(a, b) {
                return a + b;
            }
            var i = add(1, 2);
            var d = add(1.5, 2.5);
            "#,
        );
        assert!(!sink.has_errors(), "{:?}", sink.render_all());
        let mangled: Vec<&str> = ir.specializations.iter().map(|s| s.mangled_name.as_str()).collect();
        assert!(mangled.contains(&"add_int_int"));
        assert!(mangled.contains(&"add_double_double"));
        assert_eq!(ir.specializations.len(), 2);
    }

    #[test]
    fn recursive_function_resolves_return_type_to_int() {
        let (ir, sink, _) = compile(
            r#"
            function fib(n) {
                if (n < 2) {
                    return n;
                }
                return fib(n - 1) + fib(n - 2);
            }
            var result = fib(10);
            "#,
        );
        assert!(!sink.has_errors(), "{:?}", sink.render_all());
        let fib = ir
            .specializations
            .iter()
            .find(|s| s.mangled_name == "fib_int")
            .expect("fib_int specialization");
        assert_eq!(fib.return_type, Some(monoc_types::Ty::Int));
    }

    #[test]
    fn string_and_numeric_overloads_specialize_separately() {
        let (ir, sink, _) = compile(
            r#"
            function describe(x) {
                return x;
            }
            var a = describe(1);
            var b = describe("hi");
            "#,
        );
        assert!(!sink.has_errors(), "{:?}", sink.render_all());
        let mangled: Vec<&str> = ir.specializations.iter().map(|s| s.mangled_name.as_str()).collect();
        assert!(mangled.contains(&"describe_int"));
        assert!(mangled.contains(&"describe_str"));
    }

    #[test]
    fn first_class_function_reference_resolves_indirect_call() {
        let (ir, sink, _) = compile(
            r#"
            function square(x) {
                return x * x;
            }
            var f = square;
            var result = f(4);
            "#,
        );
        assert!(!sink.has_errors(), "{:?}", sink.render_all());
        assert_eq!(ir.specializations.len(), 1);
        assert_eq!(ir.specializations[0].mangled_name, "square_int");
    }

    #[test]
    fn struct_constructor_call_fills_defaulted_field() {
        let (ir, sink, _) = compile(
            r#"
            struct Vec2 {
                x: double,
                y: double = 0.0,
            }
            var v = Vec2(1.0);
            "#,
        );
        assert!(!sink.has_errors(), "{:?}", sink.render_all());
        assert!(ir.registry.contains("Vec2"));
    }

    #[test]
    fn undefined_variable_is_reported() {
        let (_, sink, _) = compile("var x = y + 1;");
        assert!(sink.has_errors());
        assert!(sink.render_all().iter().any(|d| d.contains("T301")));
    }
}
