//! The value-type lattice.
//!
//! Unlike a Hindley-Milner system, `Ty` is a *closed* tag set: there are no
//! type variables and no unification table. A binding's type is discovered
//! by evaluating the specialization's body once per call site and joining
//! the types observed at each assignment; there is nothing left to solve
//! generically once that join lands on a single tag.

use std::fmt;
use std::rc::Rc;

/// A concrete value type. `Struct` and `Function` carry enough identity
/// (name, or parameter/return shape) to compare two occurrences for
/// equality without a symbol table lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Double,
    Bool,
    String,
    Void,
    Array(Box<Ty>),
    /// An anonymous object literal's shape: field name/type pairs, always
    /// kept sorted by name (see [`Ty::object`]) so that two objects with the
    /// same fields in a different literal order still compare equal — field
    /// order is insignificant for objects, unlike [`Ty::Struct`].
    Object(Vec<(String, Ty)>),
    /// A named struct type, resolved against a [`crate::registry::TypeRegistry`].
    Struct(Rc<str>),
    /// A specialization's call type: parameter types in declared order, and
    /// its return type. Two `Function` types are equal only if both the
    /// parameter list and return type match exactly (no variance).
    Function(Vec<Ty>, Box<Ty>),
    /// A type that has not yet been pinned down by any observed use; only
    /// ever appears as an intermediate value during inference, never as a
    /// final binding type (every binding must resolve to a single concrete
    /// tag before a specialization is accepted).
    Unknown,
}

impl Ty {
    pub fn array(elem: Ty) -> Ty {
        Ty::Array(Box::new(elem))
    }

    /// Build an object type, canonicalizing field order by name so that
    /// structural equality does not depend on literal-write order.
    pub fn object(mut fields: Vec<(String, Ty)>) -> Ty {
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        Ty::Object(fields)
    }

    pub fn function(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Function(params, Box::new(ret))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int | Ty::Double)
    }

    /// Whether this type can be known without further inference, i.e. is not
    /// the placeholder [`Ty::Unknown`].
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Ty::Unknown)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Double => write!(f, "double"),
            Ty::Bool => write!(f, "bool"),
            Ty::String => write!(f, "string"),
            Ty::Void => write!(f, "void"),
            Ty::Array(elem) => write!(f, "{elem}[]"),
            Ty::Object(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, "}}")
            }
            Ty::Struct(name) => write!(f, "{name}"),
            Ty::Function(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Ty::Unknown => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_covers_int_and_double_only() {
        assert!(Ty::Int.is_numeric());
        assert!(Ty::Double.is_numeric());
        assert!(!Ty::Bool.is_numeric());
    }

    #[test]
    fn displays_array_and_function_types() {
        assert_eq!(Ty::array(Ty::Int).to_string(), "int[]");
        assert_eq!(Ty::function(vec![Ty::Int, Ty::Double], Ty::Bool).to_string(), "(int, double) -> bool");
    }

    #[test]
    fn unknown_is_not_concrete() {
        assert!(!Ty::Unknown.is_concrete());
        assert!(Ty::Void.is_concrete());
    }

    #[test]
    fn object_field_order_does_not_affect_equality() {
        let a = Ty::object(vec![("x".to_string(), Ty::Int), ("y".to_string(), Ty::Double)]);
        let b = Ty::object(vec![("y".to_string(), Ty::Double), ("x".to_string(), Ty::Int)]);
        assert_eq!(a, b);
    }
}
