use thiserror::Error;

/// Errors raised while compiling schemas or converting values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// The record type cannot be mapped. Detected once, when its schema is compiled.
    #[error("Schema configuration error in {record}: {reason}")]
    SchemaConfiguration { record: &'static str, reason: String },
    /// A stored value does not have the expected shape.
    #[error("Value format error: {0}")]
    ValueFormat(String),
}

impl MappingError {
    pub(crate) fn config(record: &'static str, reason: impl Into<String>) -> Self {
        Self::SchemaConfiguration {
            record,
            reason: reason.into(),
        }
    }

    pub(crate) fn format(reason: impl Into<String>) -> Self {
        Self::ValueFormat(reason.into())
    }

    /// Prefixes a value format error with the field it was raised for.
    pub(crate) fn at(self, record: &str, field: &str) -> Self {
        match self {
            Self::ValueFormat(reason) => Self::ValueFormat(format!("{record}.{field}: {reason}")),
            other => other,
        }
    }
}

/// Result type for mapping operations.
pub type Result<T> = std::result::Result<T, MappingError>;
