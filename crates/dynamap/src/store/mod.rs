//! The store client seam.
//!
//! The repository speaks to the store only through [`StoreClient`]. Requests
//! are already encoded items; nothing here knows about records.

#[cfg(feature = "inmemory")]
mod memory;
mod sdk;

#[cfg(feature = "inmemory")]
pub use memory::InMemoryStore;
pub use sdk::SdkStore;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use dynamap_core::Item;

use crate::error::Result;
use crate::table::{TableDefinition, TableInfo, Throughput};

/// How one attribute changes in an update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set(AttributeValue),
    /// Only written when the attribute is absent.
    SetIfNotExists(AttributeValue),
    /// Atomic counter. An absent attribute ends up at `start`.
    Increment { start: i64, delta: i64 },
    Remove,
}

/// An update of the item at `key`, returning all new attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub table: String,
    pub key: Item,
    pub actions: Vec<(String, UpdateAction)>,
}

/// Range condition on the sort key of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    Equal(AttributeValue),
    BeginsWith(AttributeValue),
    LessThan(AttributeValue),
    GreaterThan(AttributeValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table: String,
    pub index: Option<String>,
    /// Partition attribute name and value.
    pub partition: (String, AttributeValue),
    /// Sort attribute name and condition.
    pub sort: Option<(String, SortCondition)>,
    pub limit: Option<u32>,
    pub scan_index_forward: bool,
    pub exclusive_start_key: Option<Item>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetResponse {
    pub items: Vec<Item>,
    pub unprocessed_keys: Vec<Item>,
}

/// A write inside a batch or a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    Put(Item),
    /// Holds the key item.
    Delete(Item),
}

/// Operations the repository and the table helpers need from a store.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>>;

    async fn update_item(&self, request: UpdateRequest) -> Result<Item>;

    /// Deletes the item at `key` and returns its old attributes.
    async fn delete_item(&self, table: &str, key: Item) -> Result<Option<Item>>;

    async fn query(&self, request: QueryRequest) -> Result<QueryResponse>;

    async fn batch_get_items(&self, table: &str, keys: Vec<Item>) -> Result<BatchGetResponse>;

    /// Returns the writes the store left unprocessed.
    async fn batch_write_items(
        &self,
        table: &str,
        writes: Vec<WriteOperation>,
    ) -> Result<Vec<WriteOperation>>;

    /// Reads all keys atomically. The result is aligned with `keys`.
    async fn transact_get_items(&self, table: &str, keys: Vec<Item>) -> Result<Vec<Option<Item>>>;

    async fn transact_write_items(&self, table: &str, writes: Vec<WriteOperation>) -> Result<()>;

    async fn create_table(&self, definition: &TableDefinition) -> Result<TableInfo>;

    async fn describe_table(&self, table: &str) -> Result<TableInfo>;

    async fn update_table_throughput(
        &self,
        table: &str,
        throughput: Throughput,
    ) -> Result<TableInfo>;

    async fn delete_table(&self, table: &str) -> Result<TableInfo>;
}
