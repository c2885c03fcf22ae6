//! Generic repository over one compiled table schema.

use std::sync::Arc;

use dynamap_core::schema::{KeyAttribute, UpdateBehavior};
use dynamap_core::{
    Item, Key, MappingError, Page, PageQueryParam, QueryConditional, Record, SchemaCompiler,
    TableSchema,
};

use crate::error::{RepositoryError, Result};
use crate::limits::BulkOperation;
use crate::store::{QueryRequest, SortCondition, StoreClient, UpdateAction, UpdateRequest, WriteOperation};
use crate::table::{TableDefinition, TableInfo, Throughput};

/// Get, save, delete and query records of type `T` in one table.
///
/// Holds the shared schema and the store; cheap to clone.
pub struct Repository<T: Record> {
    schema: Arc<TableSchema<T>>,
    store: Arc<dyn StoreClient>,
    table_name: String,
}

impl<T: Record> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            store: Arc::clone(&self.store),
            table_name: self.table_name.clone(),
        }
    }
}

impl<T: Record> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("table_name", &self.table_name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<T: Record> Repository<T> {
    /// Compiles (or reuses) the schema of `T` and binds it to `{prefix}{table name}`.
    pub fn new(
        compiler: &SchemaCompiler,
        store: Arc<dyn StoreClient>,
        table_prefix: &str,
    ) -> Result<Self> {
        let schema = compiler.compile::<T>()?;
        if schema.partition_key().is_none() {
            return Err(MappingError::SchemaConfiguration {
                record: schema.record_name(),
                reason: "a repository requires a partition key".to_string(),
            }
            .into());
        }
        let table_name = format!("{table_prefix}{}", schema.table_name());
        Ok(Self {
            schema,
            store,
            table_name,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema(&self) -> &TableSchema<T> {
        &self.schema
    }

    /// Point lookup. A missing item is `None`, not an error.
    pub async fn get_item(&self, key: &Key) -> Result<Option<T>> {
        let key = self.schema.key_item(key)?;
        tracing::debug!(table = %self.table_name, "get item");
        let item = self.store.get_item(&self.table_name, key).await?;
        self.decode_optional(item)
    }

    /// Looks up the stored version of `record` by its key.
    pub async fn get_item_by(&self, record: &T) -> Result<Option<T>> {
        self.get_item(&self.schema.key_of(record)?).await
    }

    /// Upserts `record` and returns the stored item after the write.
    pub async fn save(&self, record: &T) -> Result<T> {
        let item = self.schema.to_item(record)?;
        let key = self.schema.key_item(&self.schema.key_of(record)?)?;
        let actions = update_actions(&self.schema, &item);
        tracing::debug!(table = %self.table_name, actions = actions.len(), "save");

        let stored = self
            .store
            .update_item(UpdateRequest {
                table: self.table_name.clone(),
                key,
                actions,
            })
            .await?;
        Ok(self.schema.from_item(&stored)?)
    }

    /// Deletes the item at `key` and returns its previous value.
    pub async fn delete(&self, key: &Key) -> Result<Option<T>> {
        let key = self.schema.key_item(key)?;
        tracing::debug!(table = %self.table_name, "delete item");
        let item = self.store.delete_item(&self.table_name, key).await?;
        self.decode_optional(item)
    }

    pub async fn delete_by(&self, record: &T) -> Result<Option<T>> {
        self.delete(&self.schema.key_of(record)?).await
    }

    pub async fn transaction_get_item(&self, key: &Key) -> Result<Option<T>> {
        let mut items = self.transaction_get_items(std::slice::from_ref(key)).await?;
        Ok(items.pop().flatten())
    }

    /// Reads up to 100 items atomically. The result is aligned with `keys`.
    pub async fn transaction_get_items(&self, keys: &[Key]) -> Result<Vec<Option<T>>> {
        self.check_limit(BulkOperation::TransactionGet, keys.len())?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let keys = self.key_items(keys)?;
        tracing::debug!(table = %self.table_name, count = keys.len(), "transaction get");

        let items = self.store.transact_get_items(&self.table_name, keys).await?;
        items
            .into_iter()
            .map(|item| self.decode_optional(item))
            .collect()
    }

    /// Reads up to 100 items, without atomicity. Missing keys are skipped.
    pub async fn batch_get_items(&self, keys: &[Key]) -> Result<Vec<T>> {
        self.check_limit(BulkOperation::BatchGet, keys.len())?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let keys = self.key_items(keys)?;
        tracing::debug!(table = %self.table_name, count = keys.len(), "batch get");

        let response = self.store.batch_get_items(&self.table_name, keys).await?;
        if !response.unprocessed_keys.is_empty() {
            return Err(self.unprocessed(BulkOperation::BatchGet, response.unprocessed_keys.len()));
        }
        response
            .items
            .iter()
            .map(|item| Ok(self.schema.from_item(item)?))
            .collect()
    }

    pub async fn transaction_save(&self, record: &T) -> Result<()> {
        self.transaction_save_items(std::slice::from_ref(record))
            .await
    }

    /// Puts up to 100 items atomically.
    pub async fn transaction_save_items(&self, records: &[T]) -> Result<()> {
        self.check_limit(BulkOperation::TransactionSave, records.len())?;
        if records.is_empty() {
            return Ok(());
        }
        let writes = self.puts(records)?;
        self.transact_write(BulkOperation::TransactionSave, writes)
            .await
    }

    /// Puts up to 25 items, without atomicity.
    pub async fn batch_save_items(&self, records: &[T]) -> Result<()> {
        self.check_limit(BulkOperation::BatchSave, records.len())?;
        if records.is_empty() {
            return Ok(());
        }
        let writes = self.puts(records)?;
        self.batch_write(BulkOperation::BatchSave, writes).await
    }

    pub async fn transaction_delete(&self, key: &Key) -> Result<()> {
        self.transaction_delete_items(std::slice::from_ref(key))
            .await
    }

    /// Deletes up to 100 items atomically.
    pub async fn transaction_delete_items(&self, keys: &[Key]) -> Result<()> {
        self.check_limit(BulkOperation::TransactionDelete, keys.len())?;
        if keys.is_empty() {
            return Ok(());
        }
        let writes = self.deletes(keys)?;
        self.transact_write(BulkOperation::TransactionDelete, writes)
            .await
    }

    pub async fn transaction_delete_items_by(&self, records: &[T]) -> Result<()> {
        self.check_limit(BulkOperation::TransactionDelete, records.len())?;
        let keys = self.keys_of(records)?;
        self.transaction_delete_items(&keys).await
    }

    /// Deletes up to 25 items, without atomicity.
    pub async fn batch_delete_items(&self, keys: &[Key]) -> Result<()> {
        self.check_limit(BulkOperation::BatchDelete, keys.len())?;
        if keys.is_empty() {
            return Ok(());
        }
        let writes = self.deletes(keys)?;
        self.batch_write(BulkOperation::BatchDelete, writes).await
    }

    pub async fn batch_delete_items_by(&self, records: &[T]) -> Result<()> {
        self.check_limit(BulkOperation::BatchDelete, records.len())?;
        let keys = self.keys_of(records)?;
        self.batch_delete_items(&keys).await
    }

    /// Queries one page of the table, or of a secondary index.
    pub async fn get_page(&self, param: &PageQueryParam) -> Result<Page<T>> {
        if param.limit == 0 {
            return Err(RepositoryError::InvalidArgument(
                "page limit must be positive".to_string(),
            ));
        }

        let (partition_key, sort_key) = self.query_keys(param.index_name.as_deref())?;
        let partition = self
            .schema
            .encode_key_value(partition_key, &param.key.partition)?;
        let sort = self.sort_condition(param, sort_key)?;
        tracing::debug!(
            table = %self.table_name,
            index = param.index_name.as_deref(),
            conditional = ?param.conditional,
            limit = param.limit,
            "get page"
        );

        let response = self
            .store
            .query(QueryRequest {
                table: self.table_name.clone(),
                index: param.index_name.clone(),
                partition: (partition_key.attribute_name().to_string(), partition),
                sort,
                limit: Some(param.limit),
                scan_index_forward: param.sort.scan_index_forward(),
                exclusive_start_key: param.exclusive_start_key.clone(),
            })
            .await?;

        let items = response
            .items
            .iter()
            .map(|item| self.schema.from_item(item))
            .collect::<dynamap_core::Result<Vec<_>>>()?;
        Ok(Page {
            items,
            last_evaluated_key: response.last_evaluated_key,
        })
    }

    /// Creates the table from the schema's keys and indices.
    pub async fn create_table(&self, throughput: Option<Throughput>) -> Result<TableInfo> {
        let definition = TableDefinition::from_schema(&self.table_name, &self.schema, throughput)?;
        tracing::debug!(
            table = %self.table_name,
            global_indexes = definition.global_indexes.len(),
            local_indexes = definition.local_indexes.len(),
            "create table"
        );
        self.store.create_table(&definition).await
    }

    pub async fn describe_table(&self) -> Result<TableInfo> {
        self.store.describe_table(&self.table_name).await
    }

    pub async fn delete_table(&self) -> Result<TableInfo> {
        tracing::debug!(table = %self.table_name, "delete table");
        self.store.delete_table(&self.table_name).await
    }

    fn query_keys(&self, index_name: Option<&str>) -> Result<(&KeyAttribute, Option<&KeyAttribute>)> {
        match index_name {
            Some(name) => {
                let index = self.schema.index(name).ok_or_else(|| {
                    RepositoryError::InvalidArgument(format!(
                        "{} has no index `{name}`",
                        self.schema.record_name()
                    ))
                })?;
                Ok((index.partition_key(), index.sort_key()))
            }
            None => {
                // Checked in `new`.
                let partition_key = self.schema.partition_key().ok_or_else(|| {
                    RepositoryError::InvalidArgument(format!(
                        "{} has no partition key",
                        self.schema.record_name()
                    ))
                })?;
                Ok((partition_key, self.schema.sort_key()))
            }
        }
    }

    fn sort_condition(
        &self,
        param: &PageQueryParam,
        sort_key: Option<&KeyAttribute>,
    ) -> Result<Option<(String, SortCondition)>> {
        let value = match &param.key.sort {
            Some(value) if !value.is_null() => value,
            _ if param.conditional.requires_sort_value() => {
                return Err(RepositoryError::InvalidArgument(format!(
                    "{:?} requires a sort value",
                    param.conditional
                )))
            }
            _ => return Ok(None),
        };

        let sort_key = sort_key.ok_or_else(|| {
            RepositoryError::InvalidArgument(format!(
                "{} has no sort key to compare against",
                param.index_name.as_deref().unwrap_or(self.schema.record_name())
            ))
        })?;
        let value = self.schema.encode_key_value(sort_key, value)?;
        let condition = match param.conditional {
            QueryConditional::KeyEqualTo => SortCondition::Equal(value),
            QueryConditional::SortBeginsWith => SortCondition::BeginsWith(value),
            QueryConditional::SortLessThan => SortCondition::LessThan(value),
            QueryConditional::SortGreaterThan => SortCondition::GreaterThan(value),
        };
        Ok(Some((sort_key.attribute_name().to_string(), condition)))
    }

    fn check_limit(&self, operation: BulkOperation, count: usize) -> Result<()> {
        operation.check(count).inspect_err(|_| {
            tracing::warn!(
                table = %self.table_name,
                %operation,
                count,
                limit = operation.limit(),
                "bulk operation rejected"
            );
        })
    }

    fn unprocessed(&self, operation: BulkOperation, count: usize) -> RepositoryError {
        tracing::warn!(table = %self.table_name, %operation, count, "items left unprocessed");
        RepositoryError::Unprocessed { operation, count }
    }

    async fn batch_write(&self, operation: BulkOperation, writes: Vec<WriteOperation>) -> Result<()> {
        tracing::debug!(table = %self.table_name, %operation, count = writes.len(), "batch write");
        let unprocessed = self
            .store
            .batch_write_items(&self.table_name, writes)
            .await?;
        if !unprocessed.is_empty() {
            return Err(self.unprocessed(operation, unprocessed.len()));
        }
        Ok(())
    }

    async fn transact_write(
        &self,
        operation: BulkOperation,
        writes: Vec<WriteOperation>,
    ) -> Result<()> {
        tracing::debug!(table = %self.table_name, %operation, count = writes.len(), "transaction write");
        self.store
            .transact_write_items(&self.table_name, writes)
            .await
    }

    fn key_items(&self, keys: &[Key]) -> Result<Vec<Item>> {
        Ok(keys
            .iter()
            .map(|key| self.schema.key_item(key))
            .collect::<dynamap_core::Result<Vec<_>>>()?)
    }

    fn keys_of(&self, records: &[T]) -> Result<Vec<Key>> {
        Ok(records
            .iter()
            .map(|record| self.schema.key_of(record))
            .collect::<dynamap_core::Result<Vec<_>>>()?)
    }

    fn puts(&self, records: &[T]) -> Result<Vec<WriteOperation>> {
        Ok(records
            .iter()
            .map(|record| self.schema.to_item(record).map(WriteOperation::Put))
            .collect::<dynamap_core::Result<Vec<_>>>()?)
    }

    fn deletes(&self, keys: &[Key]) -> Result<Vec<WriteOperation>> {
        Ok(self
            .key_items(keys)?
            .into_iter()
            .map(WriteOperation::Delete)
            .collect())
    }

    fn decode_optional(&self, item: Option<Item>) -> Result<Option<T>> {
        Ok(item
            .map(|item| self.schema.from_item(&item))
            .transpose()?)
    }
}

/// Derives the update actions of a save from the encoded record.
///
/// Key attributes are never part of the update. Counters ignore the record's
/// value and are incremented by the store.
pub(crate) fn update_actions<T: Record>(
    schema: &TableSchema<T>,
    item: &Item,
) -> Vec<(String, UpdateAction)> {
    let mut actions = Vec::new();
    for mapping in schema.attributes() {
        if mapping.is_primary_key() {
            continue;
        }
        let attribute = mapping.attribute_name().to_string();
        if let Some(counter) = mapping.atomic_counter() {
            actions.push((
                attribute,
                UpdateAction::Increment {
                    start: counter.start,
                    delta: counter.delta,
                },
            ));
            continue;
        }
        match (item.get(&attribute), mapping.update_behavior()) {
            (Some(value), UpdateBehavior::WriteAlways) => {
                actions.push((attribute, UpdateAction::Set(value.clone())));
            }
            (Some(value), UpdateBehavior::WriteIfNotExists) => {
                actions.push((attribute, UpdateAction::SetIfNotExists(value.clone())));
            }
            (None, UpdateBehavior::WriteAlways) => actions.push((attribute, UpdateAction::Remove)),
            (None, UpdateBehavior::WriteIfNotExists) => {}
        }
    }
    actions
}
