//! Schema-driven FHIR resource model.
//!
//! - [`element`]: the dynamic value tree (`Base`, `Element`, `Primitive`, `Resource`)
//! - [`schema`]: type registry with capability-based child accessors
//! - [`json`]: FHIR JSON conversion
//! - [`r4`]: built-in R4 subset

pub mod element;
pub mod json;
mod r4;
pub mod schema;

pub use element::{Base, Element, FieldMap, Primitive, Resource};
pub use r4::PRIMITIVE_TYPES;
pub use schema::{
    Cardinality, ChildAccessor, ChildDefinition, ChildMutator, FieldChild, ID_CHILD, IdChild,
    SchemaContext, SchemaContextBuilder, TypeDefinition, TypeKind,
};
