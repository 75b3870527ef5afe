//! Recursive-descent parser turning a token stream into an untyped
//! [`ast::Module`]. The parser never assigns types; that is the job of
//! `monoc-infer`'s per-specialization typed tree, kept in a separate crate
//! so the AST itself stays free of a dependency on the type system.

pub mod ast;
mod parser;

use monoc_common::diagnostics::Diagnostic;

pub use ast::Module;
pub use parser::Parser;

/// The result of parsing one source file: its syntax tree plus any syntax
/// diagnostics collected along the way. A non-empty `diagnostics` does not
/// imply `module` is unusable — panic-mode recovery fills gaps with
/// `ExprKind::Error` placeholders so later phases can still walk the tree.
pub struct Parse {
    pub module: Module,
    pub diagnostics: Vec<Diagnostic>,
}

/// Tokenize and parse `source`, a file whose diagnostics should be reported
/// under the name `file`.
pub fn parse(source: &str, file: &str) -> Parse {
    let tokens = monoc_lexer::tokenize(source);
    let mut parser = Parser::new(tokens, source, file);
    let module = parser.parse_module();
    Parse { module, diagnostics: parser.into_diagnostics() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast::{BinOp, ExprKind, Stmt};

    fn parse_ok(source: &str) -> Module {
        let result = parse(source, "test.ml");
        assert!(result.diagnostics.is_empty(), "unexpected diagnostics: {:?}", result.diagnostics);
        result.module
    }

    #[test]
    fn parses_var_decl_with_init() {
        let module = parse_ok("var x = 1;");
        assert_eq!(module.stmts.len(), 1);
        match &module.stmts[0] {
            Stmt::VarDecl(d) => {
                assert_eq!(d.name, "x");
                assert!(d.mutable);
                assert!(matches!(d.init.as_ref().unwrap().kind, ExprKind::IntLit(1)));
            }
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn let_binding_is_immutable() {
        let module = parse_ok("let x = 1;");
        match &module.stmts[0] {
            Stmt::VarDecl(d) => assert!(!d.mutable),
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn precedence_multiplies_before_adding() {
        let module = parse_ok("1 + 2 * 3;");
        match &module.stmts[0] {
            Stmt::Expr(e) => match &e.kind {
                ExprKind::Binary(BinOp::Add, lhs, rhs) => {
                    assert!(matches!(lhs.kind, ExprKind::IntLit(1)));
                    assert!(matches!(rhs.kind, ExprKind::Binary(BinOp::Mul, _, _)));
                }
                other => panic!("expected top-level Add, got {other:?}"),
            },
            other => panic!("expected Expr stmt, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_else_chain() {
        let module = parse_ok("if (x < 1) { y = 1; } else if (x < 2) { y = 2; } else { y = 3; }");
        assert_eq!(module.stmts.len(), 1);
        assert!(matches!(module.stmts[0], Stmt::If(_)));
    }

    #[test]
    fn parses_function_decl() {
        let module = parse_ok("function add(a, b) { return a + b; }");
        match &module.stmts[0] {
            Stmt::FuncDecl(f) => {
                assert_eq!(f.name, "add");
                assert_eq!(f.params, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(f.body.stmts.len(), 1);
            }
            other => panic!("expected FuncDecl, got {other:?}"),
        }
    }

    #[test]
    fn parses_struct_with_defaulted_array_field() {
        let module = parse_ok("struct Vec3 { x: double = 0.0, data: int[3] }");
        match &module.stmts[0] {
            Stmt::StructDecl(s) => {
                assert_eq!(s.name, "Vec3");
                assert_eq!(s.fields.len(), 2);
                assert_eq!(s.fields[0].name, "x");
                assert!(s.fields[0].default.is_some());
                assert_eq!(s.fields[1].name, "data");
            }
            other => panic!("expected StructDecl, got {other:?}"),
        }
    }

    #[test]
    fn parses_import_with_alias() {
        let module = parse_ok(r#"import helper = doThing from "./util.ml";"#);
        match &module.stmts[0] {
            Stmt::Import(i) => {
                assert_eq!(i.local_name, "helper");
                assert_eq!(i.origin_symbol.as_deref(), Some("doThing"));
                assert_eq!(i.source_path, "./util.ml");
            }
            other => panic!("expected Import, got {other:?}"),
        }
    }

    #[test]
    fn parses_array_builtin_and_indexing() {
        let module = parse_ok("var a = Array(10); a[0] = 5;");
        match &module.stmts[0] {
            Stmt::VarDecl(d) => assert!(matches!(d.init.as_ref().unwrap().kind, ExprKind::ArrayBuiltin(_))),
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn parses_object_literal() {
        let module = parse_ok(r#"var o = { x: 1, y: 2 };"#);
        match &module.stmts[0] {
            Stmt::VarDecl(d) => match &d.init.as_ref().unwrap().kind {
                ExprKind::ObjectLit(fields) => assert_eq!(fields.len(), 2),
                other => panic!("expected ObjectLit, got {other:?}"),
            },
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn recovers_after_missing_semicolon() {
        let result = parse("var x = 1\nvar y = 2;", "test.ml");
        assert!(!result.diagnostics.is_empty());
        assert_eq!(result.module.stmts.len(), 2);
    }

    #[test]
    fn parses_for_loop_all_clauses() {
        let module = parse_ok("for (var i = 0; i < 10; i++) { sum += i; }");
        match &module.stmts[0] {
            Stmt::For(f) => {
                assert!(f.init.is_some());
                assert!(f.cond.is_some());
                assert!(f.post.is_some());
            }
            other => panic!("expected For, got {other:?}"),
        }
    }

    #[test]
    fn parses_compound_assignment_and_ternary() {
        let module = parse_ok("x = y > 0 ? 1 : -1;");
        match &module.stmts[0] {
            Stmt::Expr(e) => match &e.kind {
                ExprKind::Assign(_, rhs) => assert!(matches!(rhs.kind, ExprKind::Ternary(..))),
                other => panic!("expected Assign, got {other:?}"),
            },
            other => panic!("expected Expr stmt, got {other:?}"),
        }
    }
}
