//! The const evaluator.
//!
//! Module-level `const` bindings and struct field defaults and array sizes
//! must all be known at compile time, before specialization discovery
//! runs — array element counts become part of the emitted IR's memory
//! layout, not a runtime value. This module evaluates the small arithmetic
//! subexpression language that const initializers are restricted to
//! (literals, unary/binary operators, ternary, and references to other
//! consts), ordering mutually-dependent consts with a tri-colour DFS and
//! reporting a cycle through `T_CONST_CYCLE` rather than evaluating one.

use rustc_hash::FxHashMap;

use monoc_common::diagnostics::{codes, DiagnosticSink, Severity};
use monoc_common::span::LineIndex;
use monoc_parser::ast::{BinOp, ConstDecl, Expr, ExprKind, UnOp};

/// The value of a fully-evaluated const expression.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Double(f64),
    Bool(bool),
    String(String),
}

impl ConstValue {
    pub fn as_positive_usize(&self) -> Option<usize> {
        match self {
            ConstValue::Int(n) if *n > 0 => Some(*n as usize),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Topologically order `decls` by their references to one another, reporting
/// (and excluding from the returned order) any decl that participates in a
/// dependency cycle.
fn order_consts(decls: &[ConstDecl], file: &str, index: &LineIndex, sink: &mut DiagnosticSink) -> Vec<usize> {
    let name_to_idx: FxHashMap<&str, usize> =
        decls.iter().enumerate().map(|(i, d)| (d.name.as_str(), i)).collect();
    let deps: Vec<Vec<usize>> = decls
        .iter()
        .map(|d| {
            let mut names = Vec::new();
            collect_idents(&d.init, &mut names);
            names.into_iter().filter_map(|n| name_to_idx.get(n.as_str()).copied()).collect()
        })
        .collect();

    let mut color = vec![Color::White; decls.len()];
    let mut order = Vec::with_capacity(decls.len());
    let mut reported = vec![false; decls.len()];

    fn visit(
        i: usize,
        decls: &[ConstDecl],
        deps: &[Vec<usize>],
        color: &mut [Color],
        order: &mut Vec<usize>,
        reported: &mut [bool],
        file: &str,
        index: &LineIndex,
        sink: &mut DiagnosticSink,
    ) {
        match color[i] {
            Color::Black => return,
            Color::Grey => {
                if !reported[i] {
                    let (line, col) = index.line_col(decls[i].span.start);
                    sink.push(monoc_common::diagnostics::Diagnostic {
                        severity: Severity::Error,
                        code: codes::T_CONST_CYCLE,
                        file: file.to_string(),
                        line,
                        col,
                        message: format!("Constant '{}' depends on itself through a cycle", decls[i].name),
                    });
                    reported[i] = true;
                }
                return;
            }
            Color::White => {}
        }
        color[i] = Color::Grey;
        for &dep in &deps[i] {
            visit(dep, decls, deps, color, order, reported, file, index, sink);
        }
        color[i] = Color::Black;
        order.push(i);
    }

    for i in 0..decls.len() {
        visit(i, decls, &deps, &mut color, &mut order, &mut reported, file, index, sink);
    }
    order.retain(|&i| !reported[i]);
    order
}

/// Evaluate every const declaration in `decls`, in dependency order,
/// returning the name-to-value map for whichever consts evaluated cleanly.
/// A const that fails to evaluate (cycle, or a non-constant subexpression)
/// is simply absent from the result; references to it elsewhere surface as
/// `T_UNDEFINED_NAME` rather than a duplicate diagnostic.
pub fn eval_consts(
    decls: &[ConstDecl],
    file: &str,
    index: &LineIndex,
    sink: &mut DiagnosticSink,
) -> FxHashMap<String, ConstValue> {
    let order = order_consts(decls, file, index, sink);
    let mut values = FxHashMap::default();
    for i in order {
        let decl = &decls[i];
        if let Some(v) = eval(&decl.init, &values, file, index, sink) {
            values.insert(decl.name.clone(), v);
        }
    }
    values
}

/// Evaluate a single constant expression against already-known const values
/// (used both for `const` declarations and for struct field defaults / array
/// sizes, which may reference module-level consts).
pub fn eval(
    expr: &Expr,
    consts: &FxHashMap<String, ConstValue>,
    file: &str,
    index: &LineIndex,
    sink: &mut DiagnosticSink,
) -> Option<ConstValue> {
    match &expr.kind {
        ExprKind::IntLit(v) => Some(ConstValue::Int(*v)),
        ExprKind::DoubleLit(v) => Some(ConstValue::Double(*v)),
        ExprKind::StringLit(s) => Some(ConstValue::String(s.clone())),
        ExprKind::BoolLit(b) => Some(ConstValue::Bool(*b)),
        ExprKind::Ident(name) => match consts.get(name) {
            Some(v) => Some(v.clone()),
            None => {
                sink.push_at(
                    Severity::Error,
                    codes::T_UNDEFINED_NAME,
                    file,
                    index,
                    expr.span,
                    format!("'{name}' is not a constant"),
                );
                None
            }
        },
        ExprKind::Unary(op, operand) => {
            let v = eval(operand, consts, file, index, sink)?;
            match (op, v) {
                (UnOp::Neg, ConstValue::Int(n)) => n.checked_neg().map(ConstValue::Int).or_else(|| {
                    arithmetic_error(sink, file, index, expr.span, "integer negation overflowed");
                    None
                }),
                (UnOp::Neg, ConstValue::Double(d)) => Some(ConstValue::Double(-d)),
                (UnOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
                _ => {
                    arithmetic_error(sink, file, index, expr.span, "operator not applicable to this constant");
                    None
                }
            }
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let l = eval(lhs, consts, file, index, sink)?;
            let r = eval(rhs, consts, file, index, sink)?;
            eval_binary(*op, l, r, expr.span, file, index, sink)
        }
        ExprKind::Ternary(cond, then_expr, else_expr) => match eval(cond, consts, file, index, sink)? {
            ConstValue::Bool(true) => eval(then_expr, consts, file, index, sink),
            ConstValue::Bool(false) => eval(else_expr, consts, file, index, sink),
            _ => {
                arithmetic_error(sink, file, index, cond.span, "ternary condition must be a constant bool");
                None
            }
        },
        _ => {
            arithmetic_error(sink, file, index, expr.span, "not a constant expression");
            None
        }
    }
}

fn eval_binary(
    op: BinOp,
    l: ConstValue,
    r: ConstValue,
    span: monoc_common::span::Span,
    file: &str,
    index: &LineIndex,
    sink: &mut DiagnosticSink,
) -> Option<ConstValue> {
    use ConstValue::*;
    match (op, l, r) {
        (BinOp::Add, Int(a), Int(b)) => checked(a.checked_add(b), sink, file, index, span),
        (BinOp::Sub, Int(a), Int(b)) => checked(a.checked_sub(b), sink, file, index, span),
        (BinOp::Mul, Int(a), Int(b)) => checked(a.checked_mul(b), sink, file, index, span),
        (BinOp::Div, Int(a), Int(b)) => {
            if b == 0 {
                arithmetic_error(sink, file, index, span, "division by zero in constant expression");
                None
            } else {
                checked(a.checked_div(b), sink, file, index, span)
            }
        }
        (BinOp::Mod, Int(a), Int(b)) => {
            if b == 0 {
                arithmetic_error(sink, file, index, span, "division by zero in constant expression");
                None
            } else {
                checked(a.checked_rem(b), sink, file, index, span)
            }
        }
        (BinOp::Add, Double(a), Double(b)) => Some(Double(a + b)),
        (BinOp::Sub, Double(a), Double(b)) => Some(Double(a - b)),
        (BinOp::Mul, Double(a), Double(b)) => Some(Double(a * b)),
        (BinOp::Div, Double(a), Double(b)) => Some(Double(a / b)),
        (BinOp::Add, String(a), String(b)) => Some(String(a + &b)),
        (BinOp::Lt, Int(a), Int(b)) => Some(Bool(a < b)),
        (BinOp::Gt, Int(a), Int(b)) => Some(Bool(a > b)),
        (BinOp::Le, Int(a), Int(b)) => Some(Bool(a <= b)),
        (BinOp::Ge, Int(a), Int(b)) => Some(Bool(a >= b)),
        (BinOp::EqEq, a, b) => Some(Bool(a == b)),
        (BinOp::Ne, a, b) => Some(Bool(a != b)),
        (BinOp::And, Bool(a), Bool(b)) => Some(Bool(a && b)),
        (BinOp::Or, Bool(a), Bool(b)) => Some(Bool(a || b)),
        _ => {
            arithmetic_error(sink, file, index, span, "mismatched operand types in constant expression");
            None
        }
    }
}

fn checked(
    result: Option<i32>,
    sink: &mut DiagnosticSink,
    file: &str,
    index: &LineIndex,
    span: monoc_common::span::Span,
) -> Option<ConstValue> {
    match result {
        Some(n) => Some(ConstValue::Int(n)),
        None => {
            arithmetic_error(sink, file, index, span, "integer arithmetic overflowed");
            None
        }
    }
}

fn arithmetic_error(
    sink: &mut DiagnosticSink,
    file: &str,
    index: &LineIndex,
    span: monoc_common::span::Span,
    message: &str,
) {
    sink.push_at(Severity::Error, codes::T_CONST_EVAL_ARITHMETIC, file, index, span, message);
}

/// Evaluate an array-size expression, requiring a positive integer result:
/// arrays are fixed-size and the size must be knowable at compile time since
/// it is part of the emitted layout.
pub fn eval_array_size(
    expr: &Expr,
    consts: &FxHashMap<String, ConstValue>,
    file: &str,
    index: &LineIndex,
    sink: &mut DiagnosticSink,
) -> Option<usize> {
    let value = eval(expr, consts, file, index, sink)?;
    match value.as_positive_usize() {
        Some(n) => Some(n),
        None => {
            sink.push_at(
                Severity::Error,
                codes::T_CONST_ARRAY_SIZE,
                file,
                index,
                expr.span,
                "Array size must be a positive constant integer",
            );
            None
        }
    }
}

fn collect_idents(expr: &Expr, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Ident(name) => out.push(name.clone()),
        ExprKind::Unary(_, e) | ExprKind::PreIncDec(_, e) | ExprKind::PostIncDec(_, e) | ExprKind::ArrayBuiltin(e) => {
            collect_idents(e, out)
        }
        ExprKind::Binary(_, l, r) | ExprKind::Assign(l, r) | ExprKind::CompoundAssign(_, l, r) | ExprKind::Index(l, r) => {
            collect_idents(l, out);
            collect_idents(r, out);
        }
        ExprKind::Ternary(a, b, c) => {
            collect_idents(a, out);
            collect_idents(b, out);
            collect_idents(c, out);
        }
        ExprKind::Member(e, _) => collect_idents(e, out),
        ExprKind::Call(callee, args) => {
            collect_idents(callee, out);
            for a in args {
                collect_idents(a, out);
            }
        }
        ExprKind::ArrayLit(elements) => {
            for e in elements {
                collect_idents(e, out);
            }
        }
        ExprKind::ObjectLit(fields) => {
            for (_, v) in fields {
                collect_idents(v, out);
            }
        }
        ExprKind::IntLit(_) | ExprKind::DoubleLit(_) | ExprKind::StringLit(_) | ExprKind::BoolLit(_) | ExprKind::Error => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monoc_common::span::Span;

    fn decl(name: &str, expr: Expr) -> ConstDecl {
        ConstDecl { name: name.to_string(), init: expr, span: Span::point(0) }
    }

    fn int(v: i32) -> Expr {
        Expr { kind: ExprKind::IntLit(v), span: Span::point(0) }
    }

    fn ident(name: &str) -> Expr {
        Expr { kind: ExprKind::Ident(name.to_string()), span: Span::point(0) }
    }

    fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
        Expr { kind: ExprKind::Binary(op, Box::new(l), Box::new(r)), span: Span::point(0) }
    }

    #[test]
    fn evaluates_arithmetic_chain() {
        let decls = vec![decl("A", int(2)), decl("B", bin(BinOp::Mul, ident("A"), int(3)))];
        let index = LineIndex::new("");
        let mut sink = DiagnosticSink::new();
        let values = eval_consts(&decls, "f.ml", &index, &mut sink);
        assert!(!sink.has_errors());
        assert_eq!(values.get("B"), Some(&ConstValue::Int(6)));
    }

    #[test]
    fn detects_self_referential_cycle() {
        let decls = vec![decl("A", bin(BinOp::Add, ident("B"), int(1))), decl("B", ident("A"))];
        let index = LineIndex::new("");
        let mut sink = DiagnosticSink::new();
        let values = eval_consts(&decls, "f.ml", &index, &mut sink);
        assert!(sink.has_errors());
        assert!(values.is_empty());
    }

    #[test]
    fn division_by_zero_is_reported() {
        let e = bin(BinOp::Div, int(1), int(0));
        let index = LineIndex::new("");
        let mut sink = DiagnosticSink::new();
        let result = eval(&e, &FxHashMap::default(), "f.ml", &index, &mut sink);
        assert!(result.is_none());
        assert!(sink.has_errors());
    }

    #[test]
    fn array_size_must_be_positive() {
        let index = LineIndex::new("");
        let mut sink = DiagnosticSink::new();
        assert!(eval_array_size(&int(0), &FxHashMap::default(), "f.ml", &index, &mut sink).is_none());
        assert!(sink.has_errors());

        let mut sink2 = DiagnosticSink::new();
        assert_eq!(eval_array_size(&int(4), &FxHashMap::default(), "f.ml", &index, &mut sink2), Some(4));
    }
}
