//! Typed DynamoDB repositories (imperative shell).
//!
//! Records are described once with [`dynamap_core::RecordDescriptor`] and compiled into a
//! [`dynamap_core::TableSchema`]. A [`Repository`] binds that schema to a table and a
//! [`StoreClient`]:
//!
//! - `store::SdkStore` talks to DynamoDB through `aws-sdk-dynamodb`
//! - `store::InMemoryStore` (feature `inmemory`) keeps tables in memory for tests
//!
//! Bulk operations are checked against the store's limits before anything is sent.

pub mod config;
mod error;
pub mod limits;
mod repository;
pub mod store;
pub mod table;

#[cfg(all(test, feature = "inmemory"))]
mod fixtures;

pub use config::StoreConfig;
pub use error::{RepositoryError, Result};
pub use limits::BulkOperation;
pub use repository::Repository;
#[cfg(feature = "inmemory")]
pub use store::InMemoryStore;
pub use store::{SdkStore, StoreClient};
pub use table::{CreateTableParam, TableInfo, TableOperations, UpdateTableParam};

pub use dynamap_core::{
    CompressionConverter, ConverterRegistry, Key, MappingError, Page, PageQueryParam,
    QueryConditional, Record, SchemaCompiler, SortDirection,
};
