//! Table administration helpers.
//!
//! [`TableOperations`] covers tables that are not described by a record
//! type: string keys only, provisioned throughput.

mod definition;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use definition::{
    BillingMode, IndexConfig, KeyDefinition, ScalarType, TableDefinition, TableInfo, TableStatus,
    Throughput,
};

use crate::error::{RepositoryError, Result};
use crate::store::StoreClient;

/// Parameters for [`TableOperations::create_table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTableParam {
    pub table_name: String,
    pub partition_key_name: String,
    pub sort_key_name: Option<String>,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl CreateTableParam {
    pub fn new(table_name: impl Into<String>, partition_key_name: impl Into<String>) -> Self {
        let throughput = Throughput::default();
        Self {
            table_name: table_name.into(),
            partition_key_name: partition_key_name.into(),
            sort_key_name: None,
            read_capacity_units: throughput.read_capacity_units,
            write_capacity_units: throughput.write_capacity_units,
        }
    }

    pub fn sort_key(mut self, name: impl Into<String>) -> Self {
        self.sort_key_name = Some(name.into());
        self
    }

    pub fn throughput(mut self, read_capacity_units: i64, write_capacity_units: i64) -> Self {
        self.read_capacity_units = read_capacity_units;
        self.write_capacity_units = write_capacity_units;
        self
    }

    fn definition(&self) -> Result<TableDefinition> {
        require_name("table name", &self.table_name)?;
        require_name("partition key name", &self.partition_key_name)?;
        if let Some(sort_key_name) = &self.sort_key_name {
            require_name("sort key name", sort_key_name)?;
        }

        Ok(TableDefinition {
            table_name: self.table_name.clone(),
            partition_key: KeyDefinition::string(&self.partition_key_name),
            sort_key: self.sort_key_name.as_deref().map(KeyDefinition::string),
            global_indexes: Vec::new(),
            local_indexes: Vec::new(),
            billing_mode: BillingMode::Provisioned(Throughput {
                read_capacity_units: self.read_capacity_units,
                write_capacity_units: self.write_capacity_units,
            }),
        })
    }
}

/// Parameters for [`TableOperations::update_table_provision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTableParam {
    pub table_name: String,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

fn require_name(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RepositoryError::InvalidArgument(format!(
            "{what} must not be blank"
        )));
    }
    Ok(())
}

/// Create, describe, reprovision and delete tables by name.
#[derive(Clone)]
pub struct TableOperations {
    store: Arc<dyn StoreClient>,
}

impl TableOperations {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    pub async fn describe_table(&self, table_name: &str) -> Result<TableInfo> {
        require_name("table name", table_name)?;
        self.store.describe_table(table_name).await
    }

    pub async fn create_table(&self, param: CreateTableParam) -> Result<TableInfo> {
        let definition = param.definition()?;
        tracing::debug!(table = %definition.table_name, "creating table");
        self.store.create_table(&definition).await
    }

    pub async fn update_table_provision(&self, param: UpdateTableParam) -> Result<TableInfo> {
        require_name("table name", &param.table_name)?;
        tracing::debug!(
            table = %param.table_name,
            read = param.read_capacity_units,
            write = param.write_capacity_units,
            "updating table throughput"
        );
        self.store
            .update_table_throughput(
                &param.table_name,
                Throughput {
                    read_capacity_units: param.read_capacity_units,
                    write_capacity_units: param.write_capacity_units,
                },
            )
            .await
    }

    pub async fn delete_table(&self, table_name: &str) -> Result<TableInfo> {
        require_name("table name", table_name)?;
        tracing::debug!(table = %table_name, "deleting table");
        self.store.delete_table(table_name).await
    }
}
