//! Specialization bookkeeping: keys, the per-function specialization set,
//! and the first-class-function value a variable holds when it is bound to
//! a function name rather than a call result.

use std::path::PathBuf;
use std::rc::Rc;

use monoc_parser::ast::FuncDecl;
use monoc_types::Ty;

use crate::typed_ast::TypedBlock;

/// Identifies one function declaration across the whole module graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FuncKey {
    pub module: PathBuf,
    pub name: String,
}

/// A function's template: its declaration plus the specializations
/// discovered for it so far, in discovery order.
pub struct FuncInfo {
    pub key: FuncKey,
    pub decl: Rc<FuncDecl>,
    /// Index into `Engine::specializations`, in discovery order.
    pub specializations: Vec<usize>,
}

/// One monotyped instance of a function for one parameter-type tuple.
pub struct Specialization {
    pub func: FuncKey,
    pub param_types: Vec<Ty>,
    pub mangled_name: String,
    /// `None` until the body has been walked at least once; a specialization
    /// with no discovered returns defaults to `Void` once finalized.
    pub return_type: Option<Ty>,
    pub body: Option<TypedBlock>,
    pub param_names: Vec<String>,
}

/// The value a variable holds when assigned a bare function name rather than
/// a call. The variable's type becomes `Function(sig)` for whichever
/// specialization it was bound to; an
/// indirect call through it resolves to the same mangled name.
#[derive(Clone, Debug)]
pub struct FirstClassFn {
    pub mangled_name: String,
    pub param_types: Vec<Ty>,
    pub return_type: Ty,
}
