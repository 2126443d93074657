//! The record mapping layer: schemas, accessors, and mapped entities.

mod accessors;
mod entity;
mod schema;

pub use accessors::PropertyAccessors;
pub use entity::Record;
pub use schema::{
    join_table_name, Association, AssociationKind, PropertyDefinition, PropertyType, RecordSchema,
    SchemaDef, SchemaRegistry,
};
