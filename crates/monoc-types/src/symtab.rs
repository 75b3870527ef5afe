//! Scope stack for name resolution during specialization.
//!
//! Mirrors a conventional lexical-scope stack: each block pushes a frame,
//! each frame maps a name to its binding, and lookup walks outward from the
//! innermost frame. Unlike a Hindley-Milner environment there is no scheme
//! generalization step — a binding's `Ty` is whatever has been observed so
//! far for it in the current specialization, joined in place as more of the
//! body is walked.

use rustc_hash::FxHashMap;

use crate::ty::Ty;

/// A single name binding: its current type and whether it may be reassigned.
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub ty: Ty,
    pub mutable: bool,
}

/// A stack of lexical scopes, one per active block/function during a single
/// specialization's inference pass.
pub struct Scope {
    frames: Vec<FxHashMap<String, Binding>>,
}

impl Scope {
    /// A fresh scope with one (function-body) frame.
    pub fn new() -> Self {
        Self { frames: vec![FxHashMap::default()] }
    }

    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the outermost frame");
        self.frames.pop();
    }

    pub fn declare(&mut self, name: impl Into<String>, binding: Binding) {
        self.frames.last_mut().expect("scope always has a frame").insert(name.into(), binding);
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Update an existing binding's type in place (used when a later
    /// assignment's type must be joined with the binding's current type).
    /// Returns `false` if `name` is not bound in any frame.
    pub fn update_ty(&mut self, name: &str, ty: Ty) -> bool {
        for frame in self.frames.iter_mut().rev() {
            if let Some(binding) = frame.get_mut(name) {
                binding.ty = ty;
                return true;
            }
        }
        false
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let mut scope = Scope::new();
        scope.declare("x", Binding { ty: Ty::Int, mutable: false });
        scope.push();
        assert_eq!(scope.lookup("x").unwrap().ty, Ty::Int);
    }

    #[test]
    fn inner_frame_shadows_outer() {
        let mut scope = Scope::new();
        scope.declare("x", Binding { ty: Ty::Int, mutable: false });
        scope.push();
        scope.declare("x", Binding { ty: Ty::String, mutable: false });
        assert_eq!(scope.lookup("x").unwrap().ty, Ty::String);
        scope.pop();
        assert_eq!(scope.lookup("x").unwrap().ty, Ty::Int);
    }

    #[test]
    fn update_ty_rewrites_in_place() {
        let mut scope = Scope::new();
        scope.declare("x", Binding { ty: Ty::Unknown, mutable: true });
        assert!(scope.update_ty("x", Ty::Double));
        assert_eq!(scope.lookup("x").unwrap().ty, Ty::Double);
        assert!(!scope.update_ty("missing", Ty::Int));
    }

    #[test]
    #[should_panic(expected = "cannot pop the outermost frame")]
    fn pop_outermost_frame_panics() {
        let mut scope = Scope::new();
        scope.pop();
    }
}
