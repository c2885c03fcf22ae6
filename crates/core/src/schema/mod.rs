//! Schema compilation: record descriptors in, immutable table schemas out.

mod builder;
mod cache;
mod compiler;
mod descriptor;
mod table;

#[cfg(test)]
pub(crate) mod fixtures;

pub use builder::{ConstructorArgs, RecordBuilder};
pub use cache::SchemaCache;
pub use compiler::SchemaCompiler;
pub use descriptor::{
    AtomicCounter, FieldDescriptor, FieldType, KeyRole, Record, RecordDescriptor, RecordRef,
    UpdateBehavior,
};
pub use table::{AttributeMapping, IndexDefinition, KeyAttribute, TableSchema};
