//! Pure mapping logic between immutable records and DynamoDB items.
//!
//! This crate contains no I/O. It provides:
//! - the value bridge between JSON documents and attribute values ([`document`]),
//! - attribute converters and their registry ([`converter`]),
//! - record descriptors and the schema compiler ([`schema`]),
//! - key and page query value objects.

pub mod converter;
pub mod document;
mod error;
mod key;
pub mod query;
pub mod schema;
pub mod value;

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

pub use converter::{AttributeConverter, AttributeKind, CompressionConverter, ConverterRegistry};
pub use error::{MappingError, Result};
pub use key::Key;
pub use query::{Page, PageQueryParam, QueryConditional, SortDirection};
pub use schema::{
    ConstructorArgs, FieldDescriptor, FieldType, Record, RecordDescriptor, SchemaCache,
    SchemaCompiler, TableSchema,
};
pub use value::{Fields, FromValue, Value};

/// A store item: attribute name to attribute value.
pub type Item = HashMap<String, AttributeValue>;
