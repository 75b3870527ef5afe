//! The specialization-discovery fixed point — the core of type inference.
//!
//! Each pass re-walks the entry module's top level and the body of every
//! specialization discovered so far. A call whose argument types are all
//! concrete either reuses an existing specialization or creates one; this
//! growth, plus each specialization's return-type join, only ever moves
//! types from [`Ty::Unknown`] toward a concrete tag, so the loop terminates
//! once that join lands on a single tag everywhere, bounded by the
//! (finite) lattice height — a hard safety bound guards against a
//! modeling bug rather than a real non-termination.

use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use monoc_common::diagnostics::{codes, DiagnosticSink, Severity};
use monoc_common::source::SourceProvider;
use monoc_common::span::{LineIndex, Span};
use monoc_modgraph::ModuleGraph;
use monoc_parser::ast::{BinOp, ConstDecl, Expr, ExprKind, FieldDecl, Stmt, StructDecl, TypeAnnotation, UnOp};
use monoc_types::consteval::{self, ConstValue};
use monoc_types::registry::{FieldInfo, StructDef};
use monoc_types::{Scope as LocalScope, Ty, TypeRegistry};

use crate::mangle::mangle;
use crate::specialize::{FirstClassFn, FuncInfo, FuncKey, Specialization};
use crate::typed_ast::{TypedBlock, TypedExpr, TypedExprKind, TypedStmt};

const MAX_ITERATIONS: usize = 256;

/// Everything the code generator needs: the resolved struct registry,
/// every discovered specialization in discovery order, and the entry
/// module's typed top-level block (lowered to the IR's `entry` function).
pub struct ProgramIr {
    pub registry: TypeRegistry,
    pub specializations: Vec<Specialization>,
    pub entry_top_level: TypedBlock,
    pub entry_module: PathBuf,
}

#[derive(Clone)]
struct ImportTarget {
    module: PathBuf,
    origin_name: String,
}

pub struct Engine<'a> {
    graph: &'a ModuleGraph,
    provider: &'a SourceProvider,
    entry: PathBuf,
    registry: TypeRegistry,
    consts: FxHashMap<PathBuf, FxHashMap<String, ConstValue>>,
    funcs: FxHashMap<FuncKey, FuncInfo>,
    imports: FxHashMap<PathBuf, FxHashMap<String, ImportTarget>>,
    specializations: Vec<Specialization>,
    spec_index: FxHashMap<(FuncKey, Vec<Ty>), usize>,
    sink: &'a mut DiagnosticSink,
    progressed: bool,
    /// Variable name -> the specialization it was last bound to, for the
    /// current top-level or specialization-body walk only (functions
    /// stored in variables). Reset at the start of each walk; re-populated
    /// as `VarDecl`/`Assign` nodes are re-walked this pass.
    current_fn_values: FxHashMap<String, FirstClassFn>,
}

/// The precomputed line index for `module`, read straight off the shared
/// [`SourceProvider`] without borrowing the rest of [`Engine`].
fn line_index<'p>(provider: &'p SourceProvider, module: &Path) -> &'p LineIndex {
    &provider.get(module).expect("module was loaded by the module graph").line_index
}

impl<'a> Engine<'a> {
    pub fn new(graph: &'a ModuleGraph, provider: &'a SourceProvider, entry: &Path, sink: &'a mut DiagnosticSink) -> Self {
        Self {
            graph,
            provider,
            entry: entry.to_path_buf(),
            registry: TypeRegistry::new(),
            consts: FxHashMap::default(),
            funcs: FxHashMap::default(),
            imports: FxHashMap::default(),
            specializations: Vec::new(),
            spec_index: FxHashMap::default(),
            sink,
            progressed: false,
            current_fn_values: FxHashMap::default(),
        }
    }

    fn file_name(&self, module: &Path) -> String {
        module.display().to_string()
    }

    fn error(&mut self, module: &Path, code: &'static str, span: Span, message: impl Into<String>) {
        let file = self.file_name(module);
        let index = line_index(self.provider, module);
        self.sink.push_at(Severity::Error, code, file, index, span, message);
    }

    // ---- Phase 0/1: collection --------------------------------------------

    pub fn run(mut self) -> ProgramIr {
        self.collect_consts_and_structs();
        self.collect_functions_and_imports();

        let mut iterations = 0;
        let mut entry_top_level = TypedBlock { stmts: Vec::new(), span: Span::point(0) };
        loop {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                let entry = self.entry.clone();
                self.error(
                    &entry,
                    codes::T_FIXED_POINT_DIVERGED,
                    Span::point(0),
                    "Specialization discovery did not converge within the safety bound",
                );
                break;
            }
            self.progressed = false;

            let entry_module = self.entry.clone();
            let top_stmts = self.module_stmts(&entry_module);
            self.current_fn_values.clear();
            let mut scope = LocalScope::new();
            let mut typed_stmts = Vec::new();
            for stmt in &top_stmts {
                if let Some(typed) = self.infer_top_level_stmt(&entry_module, stmt, &mut scope) {
                    typed_stmts.push(typed);
                }
            }
            entry_top_level = TypedBlock { stmts: typed_stmts, span: Span::point(0) };

            let mut i = 0;
            while i < self.specializations.len() {
                self.materialize_specialization(i);
                i += 1;
            }

            if !self.progressed {
                break;
            }
        }

        let entry = self.entry.clone();
        self.check_no_unknown_block(&entry, &entry_top_level);
        for i in 0..self.specializations.len() {
            let module = self.specializations[i].func.module.clone();
            if let Some(body) = self.specializations[i].body.clone() {
                self.check_no_unknown_block(&module, &body);
            }
        }

        ProgramIr {
            registry: self.registry,
            specializations: self.specializations,
            entry_top_level,
            entry_module: self.entry.clone(),
        }
    }

    fn module_stmts(&self, module: &Path) -> Vec<Stmt> {
        self.graph.get(module).map(|m| m.module.stmts.clone()).unwrap_or_default()
    }

    fn collect_consts_and_structs(&mut self) {
        for module in self.graph.order.clone() {
            let stmts = self.module_stmts(&module);
            let const_decls: Vec<ConstDecl> = stmts
                .iter()
                .filter_map(|s| match s {
                    Stmt::ConstDecl(c) => Some(c.clone()),
                    _ => None,
                })
                .collect();
            let file = self.file_name(&module);
            let index = line_index(self.provider, &module);
            let values = consteval::eval_consts(&const_decls, &file, index, self.sink);
            self.consts.insert(module.clone(), values);
        }

        for module in self.graph.order.clone() {
            let stmts = self.module_stmts(&module);
            let struct_decls: Vec<Rc<StructDecl>> = stmts
                .iter()
                .filter_map(|s| match s {
                    Stmt::StructDecl(d) => Some(d.clone()),
                    _ => None,
                })
                .collect();
            for decl in struct_decls {
                let def = self.resolve_struct(&module, &decl);
                self.registry.register(def);
            }
        }
    }

    fn resolve_struct(&mut self, module: &Path, decl: &StructDecl) -> StructDef {
        let mut fields = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            fields.push(self.resolve_field(module, field));
        }
        StructDef { name: Rc::from(decl.name.as_str()), fields }
    }

    fn resolve_field(&mut self, module: &Path, field: &FieldDecl) -> FieldInfo {
        let ty = self.resolve_type_annotation(module, &field.type_ann);
        let default = field.default.as_ref().and_then(|expr| {
            let consts = self.consts.get(module).cloned().unwrap_or_default();
            let file = self.file_name(module);
            let index = line_index(self.provider, module);
            consteval::eval(expr, &consts, &file, index, self.sink)
        });
        FieldInfo { name: field.name.clone(), ty, default }
    }

    fn resolve_type_annotation(&mut self, module: &Path, ann: &TypeAnnotation) -> Ty {
        match ann {
            TypeAnnotation::Int => Ty::Int,
            TypeAnnotation::Double => Ty::Double,
            TypeAnnotation::String => Ty::String,
            TypeAnnotation::Bool => Ty::Bool,
            TypeAnnotation::Void => Ty::Void,
            TypeAnnotation::Named(name) => Ty::Struct(Rc::from(name.as_str())),
            TypeAnnotation::Array(elem, _size) => Ty::array(self.resolve_type_annotation(module, elem)),
        }
    }

    fn collect_functions_and_imports(&mut self) {
        for module in self.graph.order.clone() {
            let stmts = self.module_stmts(&module);
            let mut import_map = FxHashMap::default();
            for stmt in &stmts {
                match stmt {
                    Stmt::FuncDecl(decl) => {
                        let key = FuncKey { module: module.clone(), name: decl.name.clone() };
                        self.funcs.insert(key.clone(), FuncInfo { key, decl: decl.clone(), specializations: Vec::new() });
                    }
                    Stmt::Import(import) => {
                        let resolved = SourceProvider::resolve_import(&module, &import.source_path);
                        let canonical = std::fs::canonicalize(&resolved).unwrap_or(resolved);
                        let origin_name = import.origin_symbol.clone().unwrap_or_else(|| import.local_name.clone());
                        import_map.insert(import.local_name.clone(), ImportTarget { module: canonical, origin_name });
                    }
                    _ => {}
                }
            }
            self.imports.insert(module, import_map);
        }
    }

    // ---- Phase 2..N: specialization discovery -----------------------------

    fn infer_top_level_stmt(&mut self, module: &Path, stmt: &Stmt, scope: &mut LocalScope) -> Option<TypedStmt> {
        match stmt {
            Stmt::FuncDecl(_) | Stmt::StructDecl(_) | Stmt::Import(_) | Stmt::ConstDecl(_) => None,
            other => self.infer_stmt(module, other, scope),
        }
    }

    fn infer_stmt(&mut self, module: &Path, stmt: &Stmt, scope: &mut LocalScope) -> Option<TypedStmt> {
        match stmt {
            Stmt::VarDecl(decl) => {
                let init = decl.init.as_ref().map(|e| self.infer_expr(module, e, scope));
                if let Some(init) = &init {
                    self.capture_fn_value(&decl.name, init);
                }
                let ty = init.as_ref().map(|e| e.ty.clone()).unwrap_or(Ty::Unknown);
                scope.declare(decl.name.clone(), monoc_types::Binding { ty: ty.clone(), mutable: decl.mutable });
                Some(TypedStmt::VarDecl { name: decl.name.clone(), mutable: decl.mutable, init, ty, span: decl.span })
            }
            Stmt::ConstDecl(decl) => {
                let init = self.infer_expr(module, &decl.init, scope);
                let ty = init.ty.clone();
                scope.declare(decl.name.clone(), monoc_types::Binding { ty: ty.clone(), mutable: false });
                Some(TypedStmt::VarDecl { name: decl.name.clone(), mutable: false, init: Some(init), ty, span: decl.span })
            }
            Stmt::Expr(e) => Some(TypedStmt::Expr(self.infer_expr(module, e, scope))),
            Stmt::If(s) => {
                let cond = self.infer_expr(module, &s.cond, scope);
                scope.push();
                let then_stmts = s.then_branch.stmts.iter().filter_map(|st| self.infer_stmt(module, st, scope)).collect();
                scope.pop();
                let then_branch = TypedBlock { stmts: then_stmts, span: s.then_branch.span };
                let else_branch = s.else_branch.as_ref().map(|b| {
                    scope.push();
                    let stmts = b.stmts.iter().filter_map(|st| self.infer_stmt(module, st, scope)).collect();
                    scope.pop();
                    TypedBlock { stmts, span: b.span }
                });
                Some(TypedStmt::If { cond, then_branch, else_branch, span: s.span })
            }
            Stmt::While(s) => {
                let cond = self.infer_expr(module, &s.cond, scope);
                scope.push();
                let stmts = s.body.stmts.iter().filter_map(|st| self.infer_stmt(module, st, scope)).collect();
                scope.pop();
                Some(TypedStmt::While { cond, body: TypedBlock { stmts, span: s.body.span }, span: s.span })
            }
            Stmt::For(s) => {
                scope.push();
                let init = s.init.as_ref().and_then(|i| self.infer_stmt(module, i, scope)).map(Box::new);
                let cond = s.cond.as_ref().map(|c| self.infer_expr(module, c, scope));
                let post = s.post.as_ref().and_then(|p| self.infer_stmt(module, p, scope)).map(Box::new);
                let stmts = s.body.stmts.iter().filter_map(|st| self.infer_stmt(module, st, scope)).collect();
                scope.pop();
                Some(TypedStmt::For { init, cond, post, body: TypedBlock { stmts, span: s.body.span }, span: s.span })
            }
            Stmt::Return(s) => {
                let value = s.value.as_ref().map(|v| self.infer_expr(module, v, scope));
                Some(TypedStmt::Return { value, span: s.span })
            }
            Stmt::Block(b) => {
                scope.push();
                let stmts = b.stmts.iter().filter_map(|st| self.infer_stmt(module, st, scope)).collect();
                scope.pop();
                Some(TypedStmt::Block(TypedBlock { stmts, span: b.span }))
            }
            Stmt::FuncDecl(_) | Stmt::StructDecl(_) | Stmt::Import(_) => None,
        }
    }

    fn infer_expr(&mut self, module: &Path, expr: &Expr, scope: &mut LocalScope) -> TypedExpr {
        let span = expr.span;
        match &expr.kind {
            ExprKind::IntLit(v) => TypedExpr { kind: TypedExprKind::IntLit(*v), ty: Ty::Int, span },
            ExprKind::DoubleLit(v) => TypedExpr { kind: TypedExprKind::DoubleLit(*v), ty: Ty::Double, span },
            ExprKind::StringLit(s) => TypedExpr { kind: TypedExprKind::StringLit(s.clone()), ty: Ty::String, span },
            ExprKind::BoolLit(b) => TypedExpr { kind: TypedExprKind::BoolLit(*b), ty: Ty::Bool, span },
            ExprKind::Ident(name) => self.infer_ident(module, name, span, scope),
            ExprKind::Unary(op, operand) => {
                let typed = self.infer_expr(module, operand, scope);
                let ty = match (op, &typed.ty) {
                    (UnOp::Neg, t) if t.is_numeric() => t.clone(),
                    (UnOp::Not, Ty::Bool) => Ty::Bool,
                    (_, Ty::Unknown) => Ty::Unknown,
                    _ => {
                        self.error(module, codes::T_TYPE_MISMATCH, span, "Operator not applicable to this type");
                        Ty::Unknown
                    }
                };
                TypedExpr { kind: TypedExprKind::Unary(*op, Box::new(typed)), ty, span }
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let l = self.infer_expr(module, lhs, scope);
                let r = self.infer_expr(module, rhs, scope);
                let ty = self.infer_binary_ty(module, *op, &l.ty, &r.ty, span);
                TypedExpr { kind: TypedExprKind::Binary(*op, Box::new(l), Box::new(r)), ty, span }
            }
            ExprKind::Ternary(cond, then_e, else_e) => {
                let cond_t = self.infer_expr(module, cond, scope);
                let then_t = self.infer_expr(module, then_e, scope);
                let else_t = self.infer_expr(module, else_e, scope);
                let ty = join_ty(&then_t.ty, &else_t.ty).unwrap_or_else(|| {
                    self.error(module, codes::T_TYPE_MISMATCH, span, "Ternary branches have incompatible types");
                    Ty::Unknown
                });
                TypedExpr {
                    kind: TypedExprKind::Ternary(Box::new(cond_t), Box::new(then_t), Box::new(else_t)),
                    ty,
                    span,
                }
            }
            ExprKind::Assign(target, value) => self.infer_assign(module, target, value, span, scope),
            ExprKind::CompoundAssign(op, target, value) => {
                let target_t = self.infer_expr(module, target, scope);
                let value_t = self.infer_expr(module, value, scope);
                let desugared_rhs_ty = self.infer_binary_ty(module, *op, &target_t.ty, &value_t.ty, span);
                if let ExprKind::Ident(name) = &target.kind {
                    self.join_assign(module, name, desugared_rhs_ty.clone(), span, scope);
                }
                TypedExpr {
                    kind: TypedExprKind::CompoundAssign(*op, Box::new(target_t), Box::new(value_t)),
                    ty: desugared_rhs_ty,
                    span,
                }
            }
            ExprKind::PreIncDec(op, operand) | ExprKind::PostIncDec(op, operand) => {
                let typed = self.infer_expr(module, operand, scope);
                if !matches!(operand.kind, ExprKind::Ident(_) | ExprKind::Member(..) | ExprKind::Index(..)) {
                    self.error(module, codes::T_TYPE_MISMATCH, operand.span, "'++'/'--' require an lvalue (a variable, field, or index expression)");
                }
                let ty = if typed.ty.is_numeric() { typed.ty.clone() } else { Ty::Unknown };
                let kind = match &expr.kind {
                    ExprKind::PreIncDec(..) => TypedExprKind::PreIncDec(*op, Box::new(typed)),
                    _ => TypedExprKind::PostIncDec(*op, Box::new(typed)),
                };
                TypedExpr { kind, ty, span }
            }
            ExprKind::Member(receiver, field) => {
                let receiver_t = self.infer_expr(module, receiver, scope);
                let ty = self.member_ty(module, &receiver_t.ty, field, span);
                TypedExpr { kind: TypedExprKind::Member(Box::new(receiver_t), field.clone()), ty, span }
            }
            ExprKind::Index(base, index_expr) => {
                let base_t = self.infer_expr(module, base, scope);
                let index_t = self.infer_expr(module, index_expr, scope);
                if index_t.ty.is_concrete() && index_t.ty != Ty::Int {
                    self.error(module, codes::T_TYPE_MISMATCH, index_expr.span, "Index expression must be an int");
                }
                let ty = match &base_t.ty {
                    Ty::Array(elem) => (**elem).clone(),
                    Ty::String => Ty::String,
                    Ty::Unknown => Ty::Unknown,
                    _ => {
                        self.error(module, codes::T_TYPE_MISMATCH, span, "Indexing requires an array or string");
                        Ty::Unknown
                    }
                };
                TypedExpr { kind: TypedExprKind::Index(Box::new(base_t), Box::new(index_t)), ty, span }
            }
            ExprKind::Call(callee, args) => self.infer_call(module, callee, args, span, scope),
            ExprKind::ArrayLit(elements) => {
                let typed: Vec<TypedExpr> = elements.iter().map(|e| self.infer_expr(module, e, scope)).collect();
                let elem_ty = typed.iter().map(|e| e.ty.clone()).try_fold(Ty::Unknown, |acc, t| {
                    if acc == Ty::Unknown {
                        Some(t)
                    } else {
                        join_ty(&acc, &t)
                    }
                });
                let ty = match elem_ty {
                    Some(t) => Ty::array(t),
                    None => {
                        self.error(module, codes::T_TYPE_MISMATCH, span, "Array literal elements have incompatible types");
                        Ty::Unknown
                    }
                };
                TypedExpr { kind: TypedExprKind::ArrayLit(typed), ty, span }
            }
            ExprKind::ObjectLit(fields) => {
                let mut typed_fields = Vec::with_capacity(fields.len());
                let mut ty_fields = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    let value_t = self.infer_expr(module, value, scope);
                    ty_fields.push((name.clone(), value_t.ty.clone()));
                    typed_fields.push((name.clone(), value_t));
                }
                let has_unknown = ty_fields.iter().any(|(_, t)| !t.is_concrete());
                let ty = if has_unknown { Ty::Unknown } else { Ty::object(ty_fields) };
                TypedExpr { kind: TypedExprKind::ObjectLit(typed_fields), ty, span }
            }
            ExprKind::ArrayBuiltin(size_expr) => {
                let size_t = self.infer_expr(module, size_expr, scope);
                if size_t.ty.is_concrete() && size_t.ty != Ty::Int {
                    self.error(module, codes::T_TYPE_MISMATCH, size_expr.span, "Array(size) requires an int size");
                }
                TypedExpr { kind: TypedExprKind::ArrayBuiltin(Box::new(size_t)), ty: Ty::array(Ty::Unknown), span }
            }
            ExprKind::Error => TypedExpr { kind: TypedExprKind::Error, ty: Ty::Unknown, span },
        }
    }

    fn infer_ident(&mut self, module: &Path, name: &str, span: Span, scope: &LocalScope) -> TypedExpr {
        if let Some(binding) = scope.lookup(name) {
            return TypedExpr { kind: TypedExprKind::Ident(name.to_string()), ty: binding.ty.clone(), span };
        }
        if let Some(value) = self.consts.get(module).and_then(|m| m.get(name)).cloned() {
            return TypedExpr { kind: literal_kind(&value), ty: const_ty(&value), span };
        }
        // A bare reference to a function name: first-class value.
        if let Some(func_key) = self.resolve_func_key(module, name) {
            let specs: Vec<usize> = self
                .funcs
                .get(&func_key)
                .map(|f| f.specializations.clone())
                .unwrap_or_default();
            if specs.len() == 1 {
                let spec = &self.specializations[specs[0]];
                if let Some(ret) = spec.return_type.clone() {
                    let ty = Ty::function(spec.param_types.clone(), ret.clone());
                    let kind = TypedExprKind::FuncValue(spec.mangled_name.clone());
                    return TypedExpr { kind, ty, span };
                }
            } else if specs.len() > 1 {
                self.error(
                    module,
                    codes::T_TYPE_MISMATCH,
                    span,
                    format!("'{name}' is overloaded and cannot be used as a plain value"),
                );
            }
            return TypedExpr { kind: TypedExprKind::Ident(name.to_string()), ty: Ty::Unknown, span };
        }
        self.error(module, codes::T_UNDEFINED_NAME, span, format!("Undefined variable: {name}"));
        TypedExpr { kind: TypedExprKind::Ident(name.to_string()), ty: Ty::Unknown, span }
    }

    fn resolve_func_key(&self, module: &Path, name: &str) -> Option<FuncKey> {
        let direct = FuncKey { module: module.to_path_buf(), name: name.to_string() };
        if self.funcs.contains_key(&direct) {
            return Some(direct);
        }
        let target = self.imports.get(module)?.get(name)?.clone();
        self.resolve_func_key(&target.module, &target.origin_name)
    }

    fn infer_binary_ty(&mut self, module: &Path, op: BinOp, l: &Ty, r: &Ty, span: Span) -> Ty {
        if !l.is_concrete() || !r.is_concrete() {
            return Ty::Unknown;
        }
        use BinOp::*;
        match op {
            Add if *l == Ty::String || *r == Ty::String => Ty::String,
            Add | Sub | Mul | Div | Mod => {
                if l.is_numeric() && r.is_numeric() {
                    if *l == Ty::Double || *r == Ty::Double {
                        Ty::Double
                    } else {
                        Ty::Int
                    }
                } else {
                    self.error(module, codes::T_TYPE_MISMATCH, span, "Arithmetic requires numeric operands");
                    Ty::Unknown
                }
            }
            BitAnd | Shr => {
                if *l == Ty::Int && *r == Ty::Int {
                    Ty::Int
                } else {
                    self.error(module, codes::T_TYPE_MISMATCH, span, "'&'/'>>' require int operands");
                    Ty::Unknown
                }
            }
            Lt | Gt | Le | Ge => {
                if (l.is_numeric() && r.is_numeric()) || (*l == Ty::String && *r == Ty::String) {
                    Ty::Bool
                } else {
                    self.error(module, codes::T_TYPE_MISMATCH, span, "Relational operators require two numerics or two strings");
                    Ty::Unknown
                }
            }
            EqEq | Ne => {
                if l == r || (l.is_numeric() && r.is_numeric()) {
                    Ty::Bool
                } else {
                    self.error(module, codes::T_INCOMPARABLE_TYPES, span, "Cannot compare these two types");
                    Ty::Unknown
                }
            }
            And | Or => {
                if *l == Ty::Bool && *r == Ty::Bool {
                    Ty::Bool
                } else {
                    self.error(module, codes::T_TYPE_MISMATCH, span, "'&&'/'||' require bool operands");
                    Ty::Unknown
                }
            }
        }
    }

    fn infer_assign(&mut self, module: &Path, target: &Expr, value: &Expr, span: Span, scope: &mut LocalScope) -> TypedExpr {
        let value_t = self.infer_expr(module, value, scope);
        let target_t = self.infer_expr(module, target, scope);
        match &target.kind {
            ExprKind::Ident(name) => {
                self.join_assign(module, name, value_t.ty.clone(), span, scope);
                self.capture_fn_value(name, &value_t);
            }
            _ => {
                if target_t.ty.is_concrete() && value_t.ty.is_concrete() && join_ty(&target_t.ty, &value_t.ty).is_none() {
                    self.error(
                        module,
                        codes::T_TYPE_MISMATCH,
                        span,
                        format!("cannot assign '{}' into a slot of type '{}'", value_t.ty, target_t.ty),
                    );
                }
            }
        }
        let ty = value_t.ty.clone();
        TypedExpr { kind: TypedExprKind::Assign(Box::new(target_t), Box::new(value_t)), ty, span }
    }

    /// Record `name` as currently bound to a specialization's mangled name
    /// when `value` is a bare function reference, so a later indirect call
    /// through `name` can resolve its callee.
    fn capture_fn_value(&mut self, name: &str, value: &TypedExpr) {
        if let TypedExprKind::FuncValue(mangled) = &value.kind {
            if let Ty::Function(params, ret) = &value.ty {
                self.current_fn_values.insert(
                    name.to_string(),
                    FirstClassFn { mangled_name: mangled.clone(), param_types: params.clone(), return_type: (**ret).clone() },
                );
            }
        }
    }

    fn join_assign(&mut self, module: &Path, name: &str, rhs_ty: Ty, span: Span, scope: &mut LocalScope) {
        if !rhs_ty.is_concrete() {
            return;
        }
        let Some(current) = scope.lookup(name).cloned() else {
            return;
        };
        if !current.mutable && current.ty.is_concrete() {
            self.error(module, codes::T_REASSIGNMENT_CONFLICT, span, format!("'{name}' is not mutable"));
            return;
        }
        match join_ty(&current.ty, &rhs_ty) {
            Some(joined) => {
                if joined != current.ty {
                    self.progressed = true;
                }
                scope.update_ty(name, joined);
            }
            None => {
                self.error(
                    module,
                    codes::T_REASSIGNMENT_CONFLICT,
                    span,
                    format!("'{name}' was '{}', cannot also hold '{}'", current.ty, rhs_ty),
                );
            }
        }
    }

    fn member_ty(&mut self, module: &Path, receiver: &Ty, field: &str, span: Span) -> Ty {
        match receiver {
            Ty::Struct(name) => match self.registry.get(name).and_then(|d| d.field(field)) {
                Some(f) => f.ty.clone(),
                None => {
                    self.error(module, codes::T_UNKNOWN_PROPERTY, span, format!("'{name}' has no field '{field}'"));
                    Ty::Unknown
                }
            },
            Ty::Object(fields) => match fields.iter().find(|(n, _)| n == field) {
                Some((_, ty)) => ty.clone(),
                None => {
                    self.error(module, codes::T_UNKNOWN_PROPERTY, span, format!("object has no field '{field}'"));
                    Ty::Unknown
                }
            },
            Ty::Unknown => Ty::Unknown,
            _ => {
                self.error(module, codes::T_UNKNOWN_PROPERTY, span, format!("'{receiver}' has no field '{field}'"));
                Ty::Unknown
            }
        }
    }

    fn infer_call(&mut self, module: &Path, callee: &Expr, args: &[Expr], span: Span, scope: &mut LocalScope) -> TypedExpr {
        if is_console_log(callee) {
            let typed_args: Vec<TypedExpr> = args.iter().map(|a| self.infer_expr(module, a, scope)).collect();
            return TypedExpr { kind: TypedExprKind::ConsoleLog(typed_args), ty: Ty::Void, span };
        }

        if let ExprKind::Ident(name) = &callee.kind {
            if self.registry.contains(name) {
                return self.infer_struct_init(module, name, args, span, scope);
            }
            if let Some(func_key) = self.resolve_func_key(module, name) {
                return self.infer_user_call(module, func_key, args, span, scope);
            }
            // Indirect call through a variable holding a first-class function
            // value.
            if let Some(fc) = self.current_fn_values.get(name).cloned() {
                let typed_args: Vec<TypedExpr> = args.iter().map(|a| self.infer_expr(module, a, scope)).collect();
                if typed_args.len() != fc.param_types.len() {
                    self.error(module, codes::T_ARITY_MISMATCH, span, "Wrong number of arguments in indirect call");
                }
                return TypedExpr {
                    kind: TypedExprKind::Call { mangled_callee: fc.mangled_name, args: typed_args },
                    ty: fc.return_type,
                    span,
                };
            }
        }

        let callee_t = self.infer_expr(module, callee, scope);
        match &callee_t.ty {
            Ty::Unknown => TypedExpr { kind: TypedExprKind::Error, ty: Ty::Unknown, span },
            Ty::Function(..) => {
                self.error(
                    module,
                    codes::T_TYPE_MISMATCH,
                    span,
                    "Indirect calls are only supported through a plain variable holding a function value",
                );
                TypedExpr { kind: TypedExprKind::Error, ty: Ty::Unknown, span }
            }
            _ => {
                self.error(module, codes::T_TYPE_MISMATCH, span, "Expression is not callable");
                TypedExpr { kind: TypedExprKind::Error, ty: Ty::Unknown, span }
            }
        }
    }

    fn infer_struct_init(&mut self, module: &Path, name: &str, args: &[Expr], span: Span, scope: &mut LocalScope) -> TypedExpr {
        let typed_args: Vec<TypedExpr> = args.iter().map(|a| self.infer_expr(module, a, scope)).collect();
        let Some(def) = self.registry.get(name).cloned() else {
            self.error(module, codes::T_UNDEFINED_NAME, span, format!("Undefined struct: {name}"));
            return TypedExpr { kind: TypedExprKind::Error, ty: Ty::Unknown, span };
        };
        if typed_args.len() > def.fields.len() {
            self.error(module, codes::T_ARITY_MISMATCH, span, format!("'{name}' takes at most {} argument(s)", def.fields.len()));
        }
        for (i, field) in def.fields.iter().enumerate() {
            if i >= typed_args.len() {
                if field.default.is_none() {
                    self.error(
                        module,
                        codes::T_ARITY_MISMATCH,
                        span,
                        format!("Missing argument for field '{}' of '{name}'", field.name),
                    );
                }
                continue;
            }
            let arg_ty = &typed_args[i].ty;
            if arg_ty.is_concrete() && join_ty(arg_ty, &field.ty) != Some(field.ty.clone()) && *arg_ty != field.ty {
                self.error(
                    module,
                    codes::T_TYPE_MISMATCH,
                    typed_args[i].span,
                    format!("Field '{}' expects '{}', got '{}'", field.name, field.ty, arg_ty),
                );
            }
        }
        TypedExpr {
            kind: TypedExprKind::StructInit { name: name.to_string(), args: typed_args },
            ty: Ty::Struct(Rc::from(name)),
            span,
        }
    }

    fn infer_user_call(&mut self, module: &Path, func_key: FuncKey, args: &[Expr], span: Span, scope: &mut LocalScope) -> TypedExpr {
        let typed_args: Vec<TypedExpr> = args.iter().map(|a| self.infer_expr(module, a, scope)).collect();
        let param_types: Vec<Ty> = typed_args.iter().map(|a| a.ty.clone()).collect();

        if param_types.iter().any(|t| !t.is_concrete()) {
            // Defer: this call's argument types aren't fully known yet.
            return TypedExpr { kind: TypedExprKind::Error, ty: Ty::Unknown, span };
        }

        let decl = match self.funcs.get(&func_key) {
            Some(info) => info.decl.clone(),
            None => {
                self.error(module, codes::T_UNDEFINED_NAME, span, format!("Undefined function: {}", func_key.name));
                return TypedExpr { kind: TypedExprKind::Error, ty: Ty::Unknown, span };
            }
        };
        if decl.params.len() != param_types.len() {
            self.error(
                module,
                codes::T_ARITY_MISMATCH,
                span,
                format!("'{}' expects {} argument(s), got {}", func_key.name, decl.params.len(), param_types.len()),
            );
            return TypedExpr { kind: TypedExprKind::Error, ty: Ty::Unknown, span };
        }

        let spec_key = (func_key.clone(), param_types.clone());
        let spec_idx = match self.spec_index.entry(spec_key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let qualified = qualified_name(&func_key);
                let mangled_name = mangle(&qualified, &param_types);
                let idx = self.specializations.len();
                self.specializations.push(Specialization {
                    func: func_key.clone(),
                    param_types: param_types.clone(),
                    mangled_name,
                    return_type: None,
                    body: None,
                    param_names: decl.params.clone(),
                });
                entry.insert(idx);
                if let Some(info) = self.funcs.get_mut(&func_key) {
                    info.specializations.push(idx);
                }
                self.progressed = true;
                idx
            }
        };

        let mangled_callee = self.specializations[spec_idx].mangled_name.clone();
        let ty = self.specializations[spec_idx].return_type.clone().unwrap_or(Ty::Unknown);
        TypedExpr { kind: TypedExprKind::Call { mangled_callee, args: typed_args }, ty, span }
    }

    fn materialize_specialization(&mut self, idx: usize) {
        let module = self.specializations[idx].func.module.clone();
        let decl = self.funcs.get(&self.specializations[idx].func).map(|f| f.decl.clone());
        let Some(decl) = decl else { return };
        let param_types = self.specializations[idx].param_types.clone();

        self.current_fn_values.clear();
        let mut scope = LocalScope::new();
        for (name, ty) in decl.params.iter().zip(param_types.iter()) {
            scope.declare(name.clone(), monoc_types::Binding { ty: ty.clone(), mutable: true });
        }

        let stmts: Vec<TypedStmt> =
            decl.body.stmts.iter().filter_map(|s| self.infer_stmt(&module, s, &mut scope)).collect();
        let body = TypedBlock { stmts, span: decl.body.span };

        let mut returns = Vec::new();
        collect_return_types(&body, &mut returns);
        let new_return_type = join_many(&returns).unwrap_or(Ty::Void);

        let spec = &mut self.specializations[idx];
        if spec.return_type.as_ref() != Some(&new_return_type) {
            self.progressed = true;
        }
        spec.return_type = Some(new_return_type);
        spec.body = Some(body);
    }

    fn check_no_unknown_block(&mut self, module: &Path, block: &TypedBlock) {
        for stmt in &block.stmts {
            self.check_no_unknown_stmt(module, stmt);
        }
    }

    fn check_no_unknown_stmt(&mut self, module: &Path, stmt: &TypedStmt) {
        match stmt {
            TypedStmt::VarDecl { ty, span, init, .. } => {
                if !ty.is_concrete() {
                    self.error(module, codes::T_TYPE_MISMATCH, *span, "Could not determine a concrete type for this binding");
                }
                if let Some(init) = init {
                    self.check_no_unknown_expr(module, init);
                }
            }
            TypedStmt::Expr(e) => self.check_no_unknown_expr(module, e),
            TypedStmt::If { cond, then_branch, else_branch, .. } => {
                self.check_no_unknown_expr(module, cond);
                self.check_no_unknown_block(module, then_branch);
                if let Some(e) = else_branch {
                    self.check_no_unknown_block(module, e);
                }
            }
            TypedStmt::While { cond, body, .. } => {
                self.check_no_unknown_expr(module, cond);
                self.check_no_unknown_block(module, body);
            }
            TypedStmt::For { init, cond, post, body, .. } => {
                if let Some(i) = init {
                    self.check_no_unknown_stmt(module, i);
                }
                if let Some(c) = cond {
                    self.check_no_unknown_expr(module, c);
                }
                if let Some(p) = post {
                    self.check_no_unknown_stmt(module, p);
                }
                self.check_no_unknown_block(module, body);
            }
            TypedStmt::Return { value, .. } => {
                if let Some(v) = value {
                    self.check_no_unknown_expr(module, v);
                }
            }
            TypedStmt::Block(b) => self.check_no_unknown_block(module, b),
        }
    }

    fn check_no_unknown_expr(&mut self, module: &Path, expr: &TypedExpr) {
        if !expr.ty.is_concrete() && !matches!(expr.kind, TypedExprKind::Error) {
            self.error(module, codes::T_TYPE_MISMATCH, expr.span, "Could not determine a concrete type for this expression");
        }
    }
}

fn is_console_log(callee: &Expr) -> bool {
    matches!(&callee.kind, ExprKind::Member(receiver, field) if field == "log" && matches!(&receiver.kind, ExprKind::Ident(n) if n == "console"))
}

fn qualified_name(key: &FuncKey) -> String {
    key.name.clone()
}

fn literal_kind(value: &ConstValue) -> TypedExprKind {
    match value {
        ConstValue::Int(v) => TypedExprKind::IntLit(*v),
        ConstValue::Double(v) => TypedExprKind::DoubleLit(*v),
        ConstValue::Bool(v) => TypedExprKind::BoolLit(*v),
        ConstValue::String(v) => TypedExprKind::StringLit(v.clone()),
    }
}

fn const_ty(value: &ConstValue) -> Ty {
    match value {
        ConstValue::Int(_) => Ty::Int,
        ConstValue::Double(_) => Ty::Double,
        ConstValue::Bool(_) => Ty::Bool,
        ConstValue::String(_) => Ty::String,
    }
}

/// The join of two types under §4.2's widening rules, or `None` if they are
/// irreconcilable (a `T307`/`T311` condition at the call site).
pub fn join_ty(a: &Ty, b: &Ty) -> Option<Ty> {
    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (Ty::Unknown, other) | (other, Ty::Unknown) => Some(other.clone()),
        (Ty::Int, Ty::Double) | (Ty::Double, Ty::Int) => Some(Ty::Double),
        _ => None,
    }
}

fn join_many(types: &[Ty]) -> Option<Ty> {
    let mut iter = types.iter().filter(|t| t.is_concrete());
    let first = iter.next()?.clone();
    iter.try_fold(first, |acc, t| join_ty(&acc, t))
}

fn collect_return_types(block: &TypedBlock, out: &mut Vec<Ty>) {
    for stmt in &block.stmts {
        collect_return_types_stmt(stmt, out);
    }
}

fn collect_return_types_stmt(stmt: &TypedStmt, out: &mut Vec<Ty>) {
    match stmt {
        TypedStmt::Return { value, .. } => out.push(value.as_ref().map(|v| v.ty.clone()).unwrap_or(Ty::Void)),
        TypedStmt::If { then_branch, else_branch, .. } => {
            collect_return_types(then_branch, out);
            if let Some(e) = else_branch {
                collect_return_types(e, out);
            }
        }
        TypedStmt::While { body, .. } => collect_return_types(body, out),
        TypedStmt::For { body, .. } => collect_return_types(body, out),
        TypedStmt::Block(b) => collect_return_types(b, out),
        TypedStmt::VarDecl { .. } | TypedStmt::Expr(_) => {}
    }
}
