//! The value-type lattice, struct registry, scope table, and const evaluator
//! shared by the module graph, the inference engine, and the code
//! generator.

pub mod consteval;
pub mod registry;
pub mod symtab;
pub mod ty;

pub use consteval::ConstValue;
pub use registry::{FieldInfo, StructDef, TypeRegistry};
pub use symtab::{Binding, Scope};
pub use ty::Ty;
