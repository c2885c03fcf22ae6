//! Table definitions and descriptions (pure data).

use dynamap_core::{AttributeKind, Record, TableSchema};
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    String,
    Number,
    Binary,
}

impl ScalarType {
    fn from_kind(kind: AttributeKind) -> Result<Self> {
        match kind {
            AttributeKind::S => Ok(Self::String),
            AttributeKind::N => Ok(Self::Number),
            AttributeKind::B => Ok(Self::Binary),
            other => Err(RepositoryError::InvalidArgument(format!(
                "{other} cannot be used as a key attribute type"
            ))),
        }
    }
}

/// A key attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDefinition {
    pub name: String,
    pub attribute_type: ScalarType,
}

impl KeyDefinition {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: ScalarType::String,
        }
    }

    fn of(key: &dynamap_core::schema::KeyAttribute) -> Result<Self> {
        Ok(Self {
            name: key.attribute_name().to_string(),
            attribute_type: ScalarType::from_kind(key.kind())?,
        })
    }
}

/// Secondary index configuration. Projection is always ALL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub partition_key: KeyDefinition,
    pub sort_key: Option<KeyDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throughput {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl Default for Throughput {
    fn default() -> Self {
        Self {
            read_capacity_units: 10,
            write_capacity_units: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BillingMode {
    #[default]
    PayPerRequest,
    Provisioned(Throughput),
}

/// Everything needed to create a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub table_name: String,
    pub partition_key: KeyDefinition,
    pub sort_key: Option<KeyDefinition>,
    pub global_indexes: Vec<IndexConfig>,
    pub local_indexes: Vec<IndexConfig>,
    pub billing_mode: BillingMode,
}

impl TableDefinition {
    /// Assembles a definition from a compiled schema's keys and indices.
    ///
    /// On-demand billing unless `throughput` is given.
    pub fn from_schema<T: Record>(
        table_name: impl Into<String>,
        schema: &TableSchema<T>,
        throughput: Option<Throughput>,
    ) -> Result<Self> {
        let partition_key = schema.partition_key().ok_or_else(|| {
            RepositoryError::InvalidArgument(format!(
                "{} has no partition key",
                schema.record_name()
            ))
        })?;

        let mut global_indexes = Vec::new();
        let mut local_indexes = Vec::new();
        for index in schema.indices() {
            let config = IndexConfig {
                name: index.name().to_string(),
                partition_key: KeyDefinition::of(index.partition_key())?,
                sort_key: index.sort_key().map(KeyDefinition::of).transpose()?,
            };
            if index.is_global() {
                global_indexes.push(config);
            } else {
                local_indexes.push(config);
            }
        }

        Ok(Self {
            table_name: table_name.into(),
            partition_key: KeyDefinition::of(partition_key)?,
            sort_key: schema.sort_key().map(KeyDefinition::of).transpose()?,
            global_indexes,
            local_indexes,
            billing_mode: throughput.map_or(BillingMode::PayPerRequest, BillingMode::Provisioned),
        })
    }

    /// Key attribute definitions, deduplicated, table keys first.
    pub fn attribute_definitions(&self) -> Vec<&KeyDefinition> {
        let indexes = self.global_indexes.iter().chain(&self.local_indexes);
        let candidates = std::iter::once(&self.partition_key)
            .chain(self.sort_key.as_ref())
            .chain(indexes.flat_map(|index| {
                std::iter::once(&index.partition_key).chain(index.sort_key.as_ref())
            }));

        let mut definitions: Vec<&KeyDefinition> = Vec::new();
        for candidate in candidates {
            if !definitions.iter().any(|d| d.name == candidate.name) {
                definitions.push(candidate);
            }
        }
        definitions
    }

    pub fn index(&self, name: &str) -> Option<&IndexConfig> {
        self.global_indexes
            .iter()
            .chain(&self.local_indexes)
            .find(|index| index.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Active,
    Creating,
    Updating,
    Deleting,
    Other,
}

/// Summary of a table description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
    pub status: TableStatus,
    pub partition_key: Option<String>,
    pub sort_key: Option<String>,
    pub global_indexes: Vec<String>,
    pub local_indexes: Vec<String>,
    pub throughput: Option<Throughput>,
    pub item_count: i64,
}
