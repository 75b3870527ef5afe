//! The AST: ~30 node shapes, every one carrying a source [`Span`].
//!
//! This tree is the *template*: untyped syntax, produced once per module by
//! [`crate::parse`]. Type inference (in `monoc-infer`) never mutates it in
//! place — it clones the body of each call function into its own typed
//! representation per specialization, leaving this tree untouched so that
//! other specializations of the same function can be derived from the same
//! template. Each clone's body is an independent AST subtree.

use std::rc::Rc;

use monoc_common::span::Span;

#[derive(Clone, Debug, Default)]
pub struct Module {
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    VarDecl(VarDecl),
    ConstDecl(ConstDecl),
    Expr(Expr),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Return(ReturnStmt),
    Block(Block),
    FuncDecl(Rc<FuncDecl>),
    StructDecl(Rc<StructDecl>),
    Import(ImportDecl),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl(d) => d.span,
            Stmt::ConstDecl(d) => d.span,
            Stmt::Expr(e) => e.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Block(b) => b.span,
            Stmt::FuncDecl(f) => f.span,
            Stmt::StructDecl(s) => s.span,
            Stmt::Import(i) => i.span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VarDecl {
    pub name: String,
    pub mutable: bool,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ConstDecl {
    pub name: String,
    pub init: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_branch: Block,
    pub else_branch: Option<Block>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: String,
    pub type_ann: TypeAnnotation,
    pub default: Option<Expr>,
    pub span: Span,
}

/// An explicit type written in a struct field declaration. This is the only
/// place the source surface names types directly; everywhere else a
/// variable is untyped at declaration and its type is discovered by
/// inference.
#[derive(Clone, Debug)]
pub enum TypeAnnotation {
    Int,
    Double,
    String,
    Bool,
    Void,
    Array(Box<TypeAnnotation>, Option<Box<Expr>>),
    Named(String),
}

#[derive(Clone, Debug)]
pub struct ImportDecl {
    pub local_name: String,
    pub source_path: String,
    pub origin_symbol: Option<String>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    IntLit(i32),
    DoubleLit(f64),
    StringLit(String),
    BoolLit(bool),
    Ident(String),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
    CompoundAssign(BinOp, Box<Expr>, Box<Expr>),
    PreIncDec(IncDecOp, Box<Expr>),
    PostIncDec(IncDecOp, Box<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    ArrayLit(Vec<Expr>),
    ObjectLit(Vec<(String, Expr)>),
    /// The `Array(size)` built-in.
    ArrayBuiltin(Box<Expr>),
    /// Placeholder produced when the parser could not recover an
    /// expression; never appears in an error-free parse.
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncDecOp {
    Inc,
    Dec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::Shr => ">>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::EqEq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}
