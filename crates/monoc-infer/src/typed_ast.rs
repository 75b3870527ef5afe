//! The typed tree a specialization owns after inference.
//!
//! This mirrors [`monoc_parser::ast`]'s shapes one-to-one but adds an
//! inferred-type slot on every node, and is produced by cloning+annotating
//! a function's template body once per specialization rather than mutating
//! the template in place.

use monoc_common::span::Span;
use monoc_parser::ast::{BinOp, IncDecOp, UnOp};
use monoc_types::Ty;

#[derive(Clone, Debug)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: Ty,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum TypedExprKind {
    IntLit(i32),
    DoubleLit(f64),
    StringLit(String),
    BoolLit(bool),
    /// A plain local/parameter read.
    Ident(String),
    Unary(UnOp, Box<TypedExpr>),
    Binary(BinOp, Box<TypedExpr>, Box<TypedExpr>),
    Ternary(Box<TypedExpr>, Box<TypedExpr>, Box<TypedExpr>),
    Assign(Box<TypedExpr>, Box<TypedExpr>),
    CompoundAssign(BinOp, Box<TypedExpr>, Box<TypedExpr>),
    PreIncDec(IncDecOp, Box<TypedExpr>),
    PostIncDec(IncDecOp, Box<TypedExpr>),
    Member(Box<TypedExpr>, String),
    Index(Box<TypedExpr>, Box<TypedExpr>),
    /// A resolved call to a user specialization, identified by its mangled
    /// name — every call expression references exactly one specialization.
    Call { mangled_callee: String, args: Vec<TypedExpr> },
    /// `console.log(...)`.
    ConsoleLog(Vec<TypedExpr>),
    /// A struct literal constructed positionally via `Name(args...)`.
    StructInit { name: String, args: Vec<TypedExpr> },
    ArrayLit(Vec<TypedExpr>),
    ObjectLit(Vec<(String, TypedExpr)>),
    ArrayBuiltin(Box<TypedExpr>),
    /// A bare reference to one specialization's mangled name, produced when
    /// a variable is assigned a function name rather than a call result
    /// (functions stored in variables).
    FuncValue(String),
    /// An expression that could not be typed; only present when the
    /// enclosing specialization has already failed and will not be emitted.
    Error,
}

#[derive(Clone, Debug)]
pub struct TypedBlock {
    pub stmts: Vec<TypedStmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum TypedStmt {
    VarDecl { name: String, mutable: bool, init: Option<TypedExpr>, ty: Ty, span: Span },
    Expr(TypedExpr),
    If { cond: TypedExpr, then_branch: TypedBlock, else_branch: Option<TypedBlock>, span: Span },
    While { cond: TypedExpr, body: TypedBlock, span: Span },
    For {
        init: Option<Box<TypedStmt>>,
        cond: Option<TypedExpr>,
        post: Option<Box<TypedStmt>>,
        body: TypedBlock,
        span: Span,
    },
    Return { value: Option<TypedExpr>, span: Span },
    Block(TypedBlock),
}
