//! Specialization name mangling: `f_<suffix1>[_<suffix2>…]`.
//!
//! Mangling is a pure function of `(qualified_name, param_types)` — two
//! calls with structurally equal parameter-type tuples always mangle to the
//! same name, and a collision can only happen when the tuples really are
//! equal.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use monoc_types::Ty;

/// The mangled-name suffix for one parameter type.
pub fn suffix_for_ty(ty: &Ty) -> String {
    match ty {
        Ty::Int => "int".to_string(),
        Ty::Double => "double".to_string(),
        Ty::Bool => "bool".to_string(),
        Ty::String => "str".to_string(),
        Ty::Void => "void".to_string(),
        Ty::Array(elem) => format!("array<{}>", suffix_for_ty(elem)),
        Ty::Object(fields) => format!("object<{:016x}>", hash_object_fields(fields)),
        Ty::Struct(name) => format!("struct<{name}>"),
        Ty::Function(params, ret) => {
            let param_suffixes: Vec<String> = params.iter().map(suffix_for_ty).collect();
            format!("fn<{}->{}>", param_suffixes.join(","), suffix_for_ty(ret))
        }
        Ty::Unknown => "unknown".to_string(),
    }
}

fn hash_object_fields(fields: &[(String, Ty)]) -> u64 {
    // `fields` is already sorted by name at construction (see `Ty::object`),
    // so the hash is stable regardless of the literal's source order.
    let mut hasher = DefaultHasher::new();
    for (name, ty) in fields {
        name.hash(&mut hasher);
        suffix_for_ty(ty).hash(&mut hasher);
    }
    hasher.finish()
}

/// Build the full mangled symbol for a specialization of `qualified_name`
/// over `param_types`.
pub fn mangle(qualified_name: &str, param_types: &[Ty]) -> String {
    if param_types.is_empty() {
        return qualified_name.to_string();
    }
    let mut name = qualified_name.to_string();
    for ty in param_types {
        name.push('_');
        name.push_str(&suffix_for_ty(ty));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_simple_arithmetic_specializations() {
        assert_eq!(mangle("add", &[Ty::Int, Ty::Int]), "add_int_int");
        assert_eq!(mangle("add", &[Ty::Double, Ty::Double]), "add_double_double");
    }

    #[test]
    fn nullary_function_is_unsuffixed() {
        assert_eq!(mangle("hello", &[]), "hello");
    }

    #[test]
    fn distinct_param_tuples_never_collide() {
        let a = mangle("f", &[Ty::array(Ty::Int)]);
        let b = mangle("f", &[Ty::array(Ty::Double)]);
        assert_ne!(a, b);
    }

    #[test]
    fn object_mangling_is_stable_regardless_of_literal_order() {
        let o1 = Ty::object(vec![("x".into(), Ty::Int), ("y".into(), Ty::Double)]);
        let o2 = Ty::object(vec![("y".into(), Ty::Double), ("x".into(), Ty::Int)]);
        assert_eq!(mangle("f", &[o1]), mangle("f", &[o2]));
    }
}
