//! Struct definitions and the registry that resolves named types against them.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::consteval::ConstValue;
use crate::ty::Ty;

/// One field of a struct declaration, with its declared type and optional
/// default value (already const-evaluated if the field had one).
#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Ty,
    pub default: Option<ConstValue>,
}

/// A resolved struct type: name plus fields in declaration order. Field
/// order matters for the struct literal call-constructor and for IR
/// emission, which lays out fields positionally.
#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: Rc<str>,
    pub fields: Vec<FieldInfo>,
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Maps struct names to their resolved definitions. Populated once per
/// module graph load, before inference runs, so inference never needs to
/// resolve a struct lazily mid-specialization.
#[derive(Default)]
pub struct TypeRegistry {
    structs: FxHashMap<Rc<str>, Rc<StructDef>>,
    /// Declaration order, kept alongside the map so code generation can
    /// emit struct type definitions deterministically instead of in
    /// hash-iteration order.
    order: Vec<Rc<str>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: StructDef) {
        self.order.push(def.name.clone());
        self.structs.insert(def.name.clone(), Rc::new(def));
    }

    pub fn get(&self, name: &str) -> Option<&Rc<StructDef>> {
        self.structs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    /// All registered structs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<StructDef>> {
        self.order.iter().map(move |name| &self.structs[name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_looks_up_struct_fields() {
        let mut registry = TypeRegistry::new();
        registry.register(StructDef {
            name: Rc::from("Vec2"),
            fields: vec![
                FieldInfo { name: "x".into(), ty: Ty::Double, default: Some(ConstValue::Double(0.0)) },
                FieldInfo { name: "y".into(), ty: Ty::Double, default: None },
            ],
        });
        let def = registry.get("Vec2").expect("Vec2 registered");
        assert_eq!(def.field("y").unwrap().ty, Ty::Double);
        assert!(!registry.contains("Vec3"));
    }
}
