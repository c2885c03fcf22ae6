//! [`StoreClient`] backed by the DynamoDB SDK client.

mod error;
mod expressions;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    self as sdk, AttributeDefinition, DeleteRequest, Get, GlobalSecondaryIndex,
    KeySchemaElement, KeyType, KeysAndAttributes, LocalSecondaryIndex, Projection,
    ProjectionType, ProvisionedThroughput, PutRequest, ReturnValue, ScalarAttributeType,
    TableDescription, TransactGetItem, TransactWriteItem, WriteRequest,
};
use aws_sdk_dynamodb::Client;
use dynamap_core::Item;

use self::error::{build_error, store_error};
use super::{
    BatchGetResponse, QueryRequest, QueryResponse, StoreClient, UpdateRequest, WriteOperation,
};
use crate::error::{RepositoryError, Result};
use crate::table::{
    BillingMode, IndexConfig, KeyDefinition, ScalarType, TableDefinition, TableInfo, TableStatus,
    Throughput,
};

/// DynamoDB store. Cheap to clone; the SDK client is reference counted.
#[derive(Debug, Clone)]
pub struct SdkStore {
    client: Client,
}

impl SdkStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl StoreClient for SdkStore {
    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| store_error("GetItem", table, e))?;

        Ok(output.item)
    }

    async fn update_item(&self, request: UpdateRequest) -> Result<Item> {
        let expression = expressions::update_expression(&request.actions);
        let (text, names, values) = match expression {
            Some(e) => (Some(e.text), e.names, e.values),
            None => (None, None, None),
        };

        let output = self
            .client
            .update_item()
            .table_name(&request.table)
            .set_key(Some(request.key))
            .set_update_expression(text)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| store_error("UpdateItem", &request.table, e))?;

        Ok(output.attributes.unwrap_or_default())
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<Option<Item>> {
        let output = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(key))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| store_error("DeleteItem", table, e))?;

        Ok(output.attributes.filter(|item| !item.is_empty()))
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let condition = expressions::key_condition(&request.partition, request.sort.as_ref());

        let output = self
            .client
            .query()
            .table_name(&request.table)
            .set_index_name(request.index.clone())
            .key_condition_expression(condition.text)
            .set_expression_attribute_names(condition.names)
            .set_expression_attribute_values(condition.values)
            .set_limit(request.limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX)))
            .scan_index_forward(request.scan_index_forward)
            .set_exclusive_start_key(request.exclusive_start_key)
            .send()
            .await
            .map_err(|e| store_error("Query", &request.table, e))?;

        Ok(QueryResponse {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }

    async fn batch_get_items(&self, table: &str, keys: Vec<Item>) -> Result<BatchGetResponse> {
        let request = KeysAndAttributes::builder()
            .set_keys(Some(keys))
            .build()
            .map_err(build_error)?;

        let output = self
            .client
            .batch_get_item()
            .request_items(table, request)
            .send()
            .await
            .map_err(|e| store_error("BatchGetItem", table, e))?;

        let items = output
            .responses
            .and_then(|mut responses| responses.remove(table))
            .unwrap_or_default();
        let unprocessed_keys = output
            .unprocessed_keys
            .and_then(|mut unprocessed| unprocessed.remove(table))
            .map(|request| request.keys().to_vec())
            .unwrap_or_default();

        Ok(BatchGetResponse {
            items,
            unprocessed_keys,
        })
    }

    async fn batch_write_items(
        &self,
        table: &str,
        writes: Vec<WriteOperation>,
    ) -> Result<Vec<WriteOperation>> {
        let requests = writes
            .into_iter()
            .map(write_request)
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(|e| store_error("BatchWriteItem", table, e))?;

        let unprocessed = output
            .unprocessed_items
            .and_then(|mut unprocessed| unprocessed.remove(table))
            .unwrap_or_default();

        Ok(unprocessed
            .iter()
            .filter_map(|request| {
                if let Some(put) = request.put_request() {
                    Some(WriteOperation::Put(put.item().clone()))
                } else {
                    request
                        .delete_request()
                        .map(|delete| WriteOperation::Delete(delete.key().clone()))
                }
            })
            .collect())
    }

    async fn transact_get_items(&self, table: &str, keys: Vec<Item>) -> Result<Vec<Option<Item>>> {
        let items = keys
            .into_iter()
            .map(|key| {
                let get = Get::builder()
                    .table_name(table)
                    .set_key(Some(key))
                    .build()
                    .map_err(build_error)?;
                Ok(TransactGetItem::builder().get(get).build())
            })
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .client
            .transact_get_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| store_error("TransactGetItems", table, e))?;

        Ok(output
            .responses
            .unwrap_or_default()
            .into_iter()
            .map(|response| response.item.filter(|item| !item.is_empty()))
            .collect())
    }

    async fn transact_write_items(&self, table: &str, writes: Vec<WriteOperation>) -> Result<()> {
        let items = writes
            .into_iter()
            .map(|write| transact_write_item(table, write))
            .collect::<Result<Vec<_>>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| store_error("TransactWriteItems", table, e))?;

        Ok(())
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<TableInfo> {
        let table = definition.table_name.as_str();
        let attribute_definitions = definition
            .attribute_definitions()
            .into_iter()
            .map(|key| {
                AttributeDefinition::builder()
                    .attribute_name(&key.name)
                    .attribute_type(to_scalar_type(key.attribute_type))
                    .build()
                    .map_err(build_error)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut request = self
            .client
            .create_table()
            .table_name(table)
            .set_key_schema(Some(key_schema(
                &definition.partition_key,
                definition.sort_key.as_ref(),
            )?))
            .set_attribute_definitions(Some(attribute_definitions));

        request = match definition.billing_mode {
            BillingMode::PayPerRequest => request.billing_mode(sdk::BillingMode::PayPerRequest),
            BillingMode::Provisioned(throughput) => request
                .billing_mode(sdk::BillingMode::Provisioned)
                .provisioned_throughput(provisioned_throughput(throughput)?),
        };

        for index in &definition.global_indexes {
            let mut gsi = GlobalSecondaryIndex::builder()
                .index_name(&index.name)
                .set_key_schema(Some(index_key_schema(index)?))
                .projection(all_projection());
            if let BillingMode::Provisioned(throughput) = definition.billing_mode {
                gsi = gsi.provisioned_throughput(provisioned_throughput(throughput)?);
            }
            request = request.global_secondary_indexes(gsi.build().map_err(build_error)?);
        }

        for index in &definition.local_indexes {
            request = request.local_secondary_indexes(
                LocalSecondaryIndex::builder()
                    .index_name(&index.name)
                    .set_key_schema(Some(index_key_schema(index)?))
                    .projection(all_projection())
                    .build()
                    .map_err(build_error)?,
            );
        }

        let output = request
            .send()
            .await
            .map_err(|e| store_error("CreateTable", table, e))?;

        describe(table, output.table_description)
    }

    async fn describe_table(&self, table: &str) -> Result<TableInfo> {
        let output = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| store_error("DescribeTable", table, e))?;

        describe(table, output.table)
    }

    async fn update_table_throughput(
        &self,
        table: &str,
        throughput: Throughput,
    ) -> Result<TableInfo> {
        let output = self
            .client
            .update_table()
            .table_name(table)
            .provisioned_throughput(provisioned_throughput(throughput)?)
            .send()
            .await
            .map_err(|e| store_error("UpdateTable", table, e))?;

        describe(table, output.table_description)
    }

    async fn delete_table(&self, table: &str) -> Result<TableInfo> {
        let output = self
            .client
            .delete_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| store_error("DeleteTable", table, e))?;

        describe(table, output.table_description)
    }
}

fn write_request(write: WriteOperation) -> Result<WriteRequest> {
    let request = match write {
        WriteOperation::Put(item) => WriteRequest::builder().put_request(
            PutRequest::builder()
                .set_item(Some(item))
                .build()
                .map_err(build_error)?,
        ),
        WriteOperation::Delete(key) => WriteRequest::builder().delete_request(
            DeleteRequest::builder()
                .set_key(Some(key))
                .build()
                .map_err(build_error)?,
        ),
    };
    Ok(request.build())
}

fn transact_write_item(table: &str, write: WriteOperation) -> Result<TransactWriteItem> {
    let item = match write {
        WriteOperation::Put(item) => TransactWriteItem::builder().put(
            sdk::Put::builder()
                .table_name(table)
                .set_item(Some(item))
                .build()
                .map_err(build_error)?,
        ),
        WriteOperation::Delete(key) => TransactWriteItem::builder().delete(
            sdk::Delete::builder()
                .table_name(table)
                .set_key(Some(key))
                .build()
                .map_err(build_error)?,
        ),
    };
    Ok(item.build())
}

fn key_schema(
    partition_key: &KeyDefinition,
    sort_key: Option<&KeyDefinition>,
) -> Result<Vec<KeySchemaElement>> {
    let mut schema = vec![KeySchemaElement::builder()
        .attribute_name(&partition_key.name)
        .key_type(KeyType::Hash)
        .build()
        .map_err(build_error)?];

    if let Some(sk) = sort_key {
        schema.push(
            KeySchemaElement::builder()
                .attribute_name(&sk.name)
                .key_type(KeyType::Range)
                .build()
                .map_err(build_error)?,
        );
    }
    Ok(schema)
}

fn index_key_schema(index: &IndexConfig) -> Result<Vec<KeySchemaElement>> {
    key_schema(&index.partition_key, index.sort_key.as_ref())
}

fn all_projection() -> Projection {
    Projection::builder()
        .projection_type(ProjectionType::All)
        .build()
}

fn provisioned_throughput(throughput: Throughput) -> Result<ProvisionedThroughput> {
    ProvisionedThroughput::builder()
        .read_capacity_units(throughput.read_capacity_units)
        .write_capacity_units(throughput.write_capacity_units)
        .build()
        .map_err(build_error)
}

fn to_scalar_type(attribute_type: ScalarType) -> ScalarAttributeType {
    match attribute_type {
        ScalarType::String => ScalarAttributeType::S,
        ScalarType::Number => ScalarAttributeType::N,
        ScalarType::Binary => ScalarAttributeType::B,
    }
}

fn describe(table: &str, description: Option<TableDescription>) -> Result<TableInfo> {
    description
        .map(|description| table_info(&description))
        .ok_or_else(|| RepositoryError::table_not_found(table))
}

/// Summarizes an SDK table description.
pub(crate) fn table_info(description: &TableDescription) -> TableInfo {
    let key_named = |key_type: KeyType| {
        description
            .key_schema()
            .iter()
            .find(|element| *element.key_type() == key_type)
            .map(|element| element.attribute_name().to_string())
    };

    let status = match description.table_status() {
        Some(sdk::TableStatus::Active) => TableStatus::Active,
        Some(sdk::TableStatus::Creating) => TableStatus::Creating,
        Some(sdk::TableStatus::Updating) => TableStatus::Updating,
        Some(sdk::TableStatus::Deleting) => TableStatus::Deleting,
        _ => TableStatus::Other,
    };

    let throughput = description.provisioned_throughput().and_then(|provisioned| {
        let read_capacity_units = provisioned.read_capacity_units().unwrap_or_default();
        let write_capacity_units = provisioned.write_capacity_units().unwrap_or_default();
        (read_capacity_units > 0 || write_capacity_units > 0).then_some(Throughput {
            read_capacity_units,
            write_capacity_units,
        })
    });

    TableInfo {
        table_name: description.table_name().unwrap_or_default().to_string(),
        status,
        partition_key: key_named(KeyType::Hash),
        sort_key: key_named(KeyType::Range),
        global_indexes: description
            .global_secondary_indexes()
            .iter()
            .filter_map(|index| index.index_name().map(str::to_string))
            .collect(),
        local_indexes: description
            .local_secondary_indexes()
            .iter()
            .filter_map(|index| index.index_name().map(str::to_string))
            .collect(),
        throughput,
        item_count: description.item_count().unwrap_or_default(),
    }
}
