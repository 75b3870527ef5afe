//! The textual IR vocabulary (output format) and a small per-function
//! builder that tracks SSA register and label counters so callers never
//! have to juggle them by hand.
//!
//! This is *not* a binding to a real LLVM: the document a compile run
//! produces is a small, self-contained instruction set big enough for the
//! runtime library this compiler ships (`printf`, `malloc`, `memcpy`, and the
//! `strcat_*`/`strconv_*` string helpers declared in [`crate::runtime`]).
//! Keeping it textual, rather than reaching for a real backend crate,
//! matches what the driver's exit-code contract assumes: a `.ll` file it
//! can write out and diff, nothing more.

use std::fmt::Write as _;

use monoc_types::Ty;

/// Map a value type to its IR type name. Strings and structs are always
/// passed and stored behind a pointer; everything else is a value type.
pub fn ir_type(ty: &Ty) -> String {
    match ty {
        Ty::Int => "i32".to_string(),
        Ty::Double => "double".to_string(),
        Ty::Bool => "i1".to_string(),
        Ty::Void => "void".to_string(),
        Ty::String => "%String*".to_string(),
        Ty::Array(elem) => format!("{}*", ir_type(elem)),
        Ty::Struct(name) => format!("%struct.{name}*"),
        // Anonymous objects and first-class function values are both
        // erased to an opaque pointer; nothing in this language reflects
        // on their shape at runtime.
        Ty::Object(_) => "i8*".to_string(),
        Ty::Function(..) => "i8*".to_string(),
        // Only reachable as an `Array(n)` builtin's element type when no
        // later write ever pinned it down (inference leaves `Array(Unknown)`
        // concrete at the array level even though its element never
        // resolved); such a binding is dead storage, so a raw byte lets it
        // still allocate and zero-fill correctly.
        Ty::Unknown => "i8".to_string(),
    }
}

/// The zero/identity value for a type, used to default-initialize a slot
/// before its first assignment and for `Array(n)`'s zero-fill guarantee.
pub fn ir_zero(ty: &Ty) -> String {
    match ty {
        Ty::Int => "0".to_string(),
        Ty::Double => "0.0".to_string(),
        Ty::Bool => "0".to_string(),
        Ty::String | Ty::Array(_) | Ty::Struct(_) | Ty::Object(_) | Ty::Function(..) => "null".to_string(),
        Ty::Void => "void".to_string(),
        Ty::Unknown => "0".to_string(),
    }
}

/// Render a double the way the runtime's `strconv_double` does: enough
/// digits to round-trip, never scientific notation for small magnitudes.
pub fn format_double_literal(value: f64) -> String {
    if value == value.trunc() && value.is_finite() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Builds one function body: a flat list of already-rendered instruction
/// lines plus the counters needed to keep generating fresh names.
pub struct FuncBuilder {
    pub lines: Vec<String>,
    next_reg: u32,
    next_label: u32,
    /// Whether the current block has already ended in a `br`/`ret`. A
    /// structured statement (if/while/for) that falls through to its own
    /// "end" label must not emit a second terminator onto a block a nested
    /// `return` already closed.
    terminated: bool,
}

impl FuncBuilder {
    pub fn new() -> Self {
        Self { lines: Vec::new(), next_reg: 0, next_label: 0, terminated: false }
    }

    /// A fresh SSA register name, e.g. `%t7`.
    pub fn fresh_reg(&mut self) -> String {
        let name = format!("%t{}", self.next_reg);
        self.next_reg += 1;
        name
    }

    /// A fresh basic block label, e.g. `if.then3`.
    pub fn fresh_label(&mut self, hint: &str) -> String {
        let name = format!("{hint}{}", self.next_label);
        self.next_label += 1;
        name
    }

    pub fn emit(&mut self, line: impl Into<String>) {
        self.lines.push(format!("  {}", line.into()));
    }

    pub fn label(&mut self, name: &str) {
        self.lines.push(format!("{name}:"));
        self.terminated = false;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Jump to `target` unless the current block already ended in a
    /// `br`/`ret` (e.g. every path through an `if`'s branch returned).
    pub fn branch_if_open(&mut self, target: &str) {
        if !self.terminated {
            self.br(target);
        }
    }

    /// A source-location comment, emitted only when the driver asked for
    /// debug info.
    pub fn debug_comment(&mut self, file: &str, line: u32, col: u32) {
        self.lines.push(format!("  ; dbg {file}:{line}:{col}"));
    }

    /// `%dst = alloca <ty>`, returning the pointer register.
    pub fn alloca(&mut self, ty: &str) -> String {
        let reg = self.fresh_reg();
        self.emit(format!("{reg} = alloca {ty}"));
        reg
    }

    pub fn store(&mut self, ty: &str, value: &str, ptr: &str) {
        self.emit(format!("store {ty} {value}, {ty}* {ptr}"));
    }

    pub fn load(&mut self, ty: &str, ptr: &str) -> String {
        let reg = self.fresh_reg();
        self.emit(format!("{reg} = load {ty}, {ty}* {ptr}"));
        reg
    }

    pub fn binop(&mut self, op: &str, ty: &str, lhs: &str, rhs: &str) -> String {
        let reg = self.fresh_reg();
        self.emit(format!("{reg} = {op} {ty} {lhs}, {rhs}"));
        reg
    }

    pub fn cmp(&mut self, kind: &str, pred: &str, ty: &str, lhs: &str, rhs: &str) -> String {
        let reg = self.fresh_reg();
        self.emit(format!("{reg} = {kind} {pred} {ty} {lhs}, {rhs}"));
        reg
    }

    /// `%dst = call <ret-ty> @callee(<ty> arg, ...)`, or a bare `call void`
    /// statement when `ret_ty` is `void`.
    pub fn call(&mut self, ret_ty: &str, callee: &str, args: &[(String, String)]) -> Option<String> {
        let rendered_args: Vec<String> = args.iter().map(|(ty, v)| format!("{ty} {v}")).collect();
        let call_text = format!("call {ret_ty} @{callee}({})", rendered_args.join(", "));
        if ret_ty == "void" {
            self.emit(call_text);
            None
        } else {
            let reg = self.fresh_reg();
            self.emit(format!("{reg} = {call_text}"));
            Some(reg)
        }
    }

    pub fn br(&mut self, target: &str) {
        self.emit(format!("br label %{target}"));
        self.terminated = true;
    }

    pub fn cond_br(&mut self, cond: &str, then_label: &str, else_label: &str) {
        self.emit(format!("br i1 {cond}, label %{then_label}, label %{else_label}"));
        self.terminated = true;
    }

    pub fn ret(&mut self, ty: &str, value: Option<&str>) {
        match value {
            Some(v) if ty != "void" => self.emit(format!("ret {ty} {v}")),
            _ => self.emit("ret void".to_string()),
        }
        self.terminated = true;
    }

    /// `getelementptr` into a struct field by positional index.
    pub fn gep_field(&mut self, struct_ty: &str, ptr: &str, index: usize) -> String {
        let reg = self.fresh_reg();
        self.emit(format!("{reg} = getelementptr {struct_ty}, {struct_ty}* {ptr}, i32 0, i32 {index}"));
        reg
    }

    pub fn into_body(self) -> String {
        let mut out = String::new();
        for line in self.lines {
            let _ = writeln!(out, "{line}");
        }
        out
    }
}

impl Default for FuncBuilder {
    fn default() -> Self {
        Self::new()
    }
}
