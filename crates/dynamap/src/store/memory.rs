//! In-memory store implementation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use dynamap_core::Item;
use tokio::sync::RwLock;

use super::{
    BatchGetResponse, QueryRequest, QueryResponse, SortCondition, StoreClient, UpdateAction,
    UpdateRequest, WriteOperation,
};
use crate::error::{RepositoryError, Result};
use crate::table::{BillingMode, TableDefinition, TableInfo, TableStatus, Throughput};

/// In-memory store for testing.
///
/// Tables live in an `Arc<RwLock<_>>`; clones share them. Every call is
/// counted, so tests can assert that a rejected operation sent nothing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
    requests: Arc<AtomicUsize>,
}

#[derive(Debug, Clone)]
struct MemoryTable {
    definition: TableDefinition,
    items: Vec<Item>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    fn count(&self) {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

impl MemoryTable {
    fn key_names(&self) -> Vec<&str> {
        std::iter::once(self.definition.partition_key.name.as_str())
            .chain(self.definition.sort_key.as_ref().map(|k| k.name.as_str()))
            .collect()
    }

    fn check_key(&self, key: &Item) -> Result<()> {
        let names = self.key_names();
        let complete = names.iter().all(|name| key.get(*name).is_some_and(is_scalar));
        if !complete || key.len() != names.len() {
            return Err(RepositoryError::InvalidArgument(format!(
                "the provided key does not match the key schema of {}",
                self.definition.table_name
            )));
        }
        Ok(())
    }

    fn key_of(&self, item: &Item) -> Item {
        self.key_names()
            .into_iter()
            .filter_map(|name| item.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }

    fn position(&self, key: &Item) -> Option<usize> {
        let names = self.key_names();
        self.items
            .iter()
            .position(|item| names.iter().all(|name| item.get(*name) == key.get(*name)))
    }

    fn get(&self, key: &Item) -> Result<Option<Item>> {
        self.check_key(key)?;
        Ok(self.position(key).map(|i| self.items[i].clone()))
    }

    fn put(&mut self, item: Item) -> Result<()> {
        let key = self.key_of(&item);
        self.check_key(&key)?;
        match self.position(&key) {
            Some(i) => self.items[i] = item,
            None => self.items.push(item),
        }
        Ok(())
    }

    fn delete(&mut self, key: &Item) -> Result<Option<Item>> {
        self.check_key(key)?;
        Ok(self.position(key).map(|i| self.items.remove(i)))
    }

    fn apply(&mut self, write: WriteOperation) -> Result<()> {
        match write {
            WriteOperation::Put(item) => self.put(item),
            WriteOperation::Delete(key) => self.delete(&key).map(|_| ()),
        }
    }

    fn info(&self, status: TableStatus) -> TableInfo {
        TableInfo {
            table_name: self.definition.table_name.clone(),
            status,
            partition_key: Some(self.definition.partition_key.name.clone()),
            sort_key: self.definition.sort_key.as_ref().map(|k| k.name.clone()),
            global_indexes: self
                .definition
                .global_indexes
                .iter()
                .map(|index| index.name.clone())
                .collect(),
            local_indexes: self
                .definition
                .local_indexes
                .iter()
                .map(|index| index.name.clone())
                .collect(),
            throughput: match self.definition.billing_mode {
                BillingMode::PayPerRequest => None,
                BillingMode::Provisioned(throughput) => Some(throughput),
            },
            item_count: i64::try_from(self.items.len()).unwrap_or(i64::MAX),
        }
    }
}

fn is_scalar(value: &AttributeValue) -> bool {
    matches!(
        value,
        AttributeValue::S(_) | AttributeValue::N(_) | AttributeValue::B(_)
    )
}

/// Orders two key values of the same kind. Numbers compare numerically.
fn compare(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::S(l), AttributeValue::S(r)) => Some(l.cmp(r)),
        (AttributeValue::N(l), AttributeValue::N(r)) => {
            let l: f64 = l.parse().ok()?;
            let r: f64 = r.parse().ok()?;
            l.partial_cmp(&r)
        }
        (AttributeValue::B(l), AttributeValue::B(r)) => Some(l.as_ref().cmp(r.as_ref())),
        _ => None,
    }
}

fn satisfies(value: &AttributeValue, condition: &SortCondition) -> bool {
    match condition {
        SortCondition::Equal(expected) => compare(value, expected) == Some(Ordering::Equal),
        SortCondition::LessThan(bound) => compare(value, bound) == Some(Ordering::Less),
        SortCondition::GreaterThan(bound) => compare(value, bound) == Some(Ordering::Greater),
        SortCondition::BeginsWith(prefix) => match (value, prefix) {
            (AttributeValue::S(v), AttributeValue::S(p)) => v.starts_with(p.as_str()),
            (AttributeValue::B(v), AttributeValue::B(p)) => v.as_ref().starts_with(p.as_ref()),
            _ => false,
        },
    }
}

fn increment(current: Option<&AttributeValue>, start: i64, delta: i64) -> Result<AttributeValue> {
    let next = match current {
        None => start,
        Some(AttributeValue::N(n)) => n
            .parse::<i64>()
            .map_err(|e| RepositoryError::InvalidArgument(format!("counter `{n}`: {e}")))?
            .checked_add(delta)
            .ok_or_else(|| {
                RepositoryError::InvalidArgument(format!("counter `{n}` overflows when adding {delta}"))
            })?,
        Some(_) => {
            return Err(RepositoryError::InvalidArgument(
                "an atomic counter attribute must be a number".to_string(),
            ))
        }
    };
    Ok(AttributeValue::N(next.to_string()))
}

impl InMemoryStore {
    async fn with_table<F, R>(&self, table: &str, f: F) -> Result<R>
    where
        F: FnOnce(&MemoryTable) -> Result<R>,
    {
        self.count();
        let tables = self.tables.read().await;
        let table = tables
            .get(table)
            .ok_or_else(|| RepositoryError::table_not_found(table))?;
        f(table)
    }

    async fn with_table_mut<F, R>(&self, table: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut MemoryTable) -> Result<R>,
    {
        self.count();
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table)
            .ok_or_else(|| RepositoryError::table_not_found(table))?;
        f(table)
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>> {
        self.with_table(table, |t| t.get(&key)).await
    }

    async fn update_item(&self, request: UpdateRequest) -> Result<Item> {
        self.with_table_mut(&request.table, |t| {
            t.check_key(&request.key)?;
            let mut item = match t.position(&request.key) {
                Some(i) => t.items[i].clone(),
                None => request.key.clone(),
            };
            for (attribute, action) in request.actions {
                match action {
                    UpdateAction::Set(value) => {
                        item.insert(attribute, value);
                    }
                    UpdateAction::SetIfNotExists(value) => {
                        item.entry(attribute).or_insert(value);
                    }
                    UpdateAction::Increment { start, delta } => {
                        let next = increment(item.get(&attribute), start, delta)?;
                        item.insert(attribute, next);
                    }
                    UpdateAction::Remove => {
                        item.remove(&attribute);
                    }
                }
            }
            t.put(item.clone())?;
            Ok(item)
        })
        .await
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<Option<Item>> {
        self.with_table_mut(table, |t| t.delete(&key)).await
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.with_table(&request.table, |t| {
            if let Some(index) = &request.index {
                if t.definition.index(index).is_none() {
                    return Err(RepositoryError::InvalidArgument(format!(
                        "the table does not have the specified index: {index}"
                    )));
                }
            }

            let (partition_name, partition_value) = &request.partition;
            let mut matched: Vec<&Item> = t
                .items
                .iter()
                .filter(|item| item.get(partition_name) == Some(partition_value))
                .filter(|item| match &request.sort {
                    Some((name, condition)) => {
                        item.get(name).is_some_and(|v| satisfies(v, condition))
                    }
                    None => true,
                })
                .collect();

            let sort_name = request
                .sort
                .as_ref()
                .map(|(name, _)| name.clone())
                .or_else(|| match &request.index {
                    Some(index) => t
                        .definition
                        .index(index)
                        .and_then(|i| i.sort_key.as_ref())
                        .map(|k| k.name.clone()),
                    None => t.definition.sort_key.as_ref().map(|k| k.name.clone()),
                });
            if let Some(sort_name) = &sort_name {
                matched.sort_by(|a, b| match (a.get(sort_name), b.get(sort_name)) {
                    (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                });
            }
            if !request.scan_index_forward {
                matched.reverse();
            }

            if let Some(start) = &request.exclusive_start_key {
                let start = t.key_of(start);
                if let Some(i) = matched.iter().position(|item| t.key_of(item) == start) {
                    matched = matched.split_off(i + 1);
                }
            }

            let limit = request
                .limit
                .map_or(matched.len(), |l| usize::try_from(l).unwrap_or(usize::MAX));
            let has_more = matched.len() > limit;
            let items: Vec<Item> = matched.into_iter().take(limit).cloned().collect();

            let last_evaluated_key = if has_more {
                items.last().map(|last| {
                    let mut key = t.key_of(last);
                    key.insert(partition_name.clone(), partition_value.clone());
                    if let Some(name) = &sort_name {
                        if let Some(value) = last.get(name) {
                            key.insert(name.clone(), value.clone());
                        }
                    }
                    key
                })
            } else {
                None
            };

            Ok(QueryResponse {
                items,
                last_evaluated_key,
            })
        })
        .await
    }

    async fn batch_get_items(&self, table: &str, keys: Vec<Item>) -> Result<BatchGetResponse> {
        self.with_table(table, |t| {
            let mut items = Vec::new();
            for key in &keys {
                items.extend(t.get(key)?);
            }
            Ok(BatchGetResponse {
                items,
                unprocessed_keys: Vec::new(),
            })
        })
        .await
    }

    async fn batch_write_items(
        &self,
        table: &str,
        writes: Vec<WriteOperation>,
    ) -> Result<Vec<WriteOperation>> {
        self.with_table_mut(table, |t| {
            for write in writes {
                t.apply(write)?;
            }
            Ok(Vec::new())
        })
        .await
    }

    async fn transact_get_items(&self, table: &str, keys: Vec<Item>) -> Result<Vec<Option<Item>>> {
        self.with_table(table, |t| keys.iter().map(|key| t.get(key)).collect())
            .await
    }

    async fn transact_write_items(&self, table: &str, writes: Vec<WriteOperation>) -> Result<()> {
        self.with_table_mut(table, |t| {
            let snapshot = t.items.clone();
            for write in writes {
                if let Err(err) = t.apply(write) {
                    t.items = snapshot;
                    return Err(err);
                }
            }
            Ok(())
        })
        .await
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<TableInfo> {
        self.count();
        let mut tables = self.tables.write().await;
        if tables.contains_key(&definition.table_name) {
            return Err(RepositoryError::table_in_use(&definition.table_name));
        }
        let table = MemoryTable {
            definition: definition.clone(),
            items: Vec::new(),
        };
        let info = table.info(TableStatus::Active);
        tables.insert(definition.table_name.clone(), table);
        Ok(info)
    }

    async fn describe_table(&self, table: &str) -> Result<TableInfo> {
        self.with_table(table, |t| Ok(t.info(TableStatus::Active)))
            .await
    }

    async fn update_table_throughput(
        &self,
        table: &str,
        throughput: Throughput,
    ) -> Result<TableInfo> {
        self.with_table_mut(table, |t| {
            t.definition.billing_mode = BillingMode::Provisioned(throughput);
            Ok(t.info(TableStatus::Active))
        })
        .await
    }

    async fn delete_table(&self, table: &str) -> Result<TableInfo> {
        self.count();
        let mut tables = self.tables.write().await;
        tables
            .remove(table)
            .map(|t| t.info(TableStatus::Deleting))
            .ok_or_else(|| RepositoryError::table_not_found(table))
    }
}
