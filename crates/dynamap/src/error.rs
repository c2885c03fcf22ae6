use aws_sdk_dynamodb::types::error::{ResourceInUseException, ResourceNotFoundException};
use dynamap_core::MappingError;
use thiserror::Error;

use crate::limits::BulkOperation;

/// Errors that can occur during repository and table operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Schema configuration or value format failure.
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("Limit exceeded: {operation} accepts at most {limit} items, got {count}")]
    LimitExceeded {
        operation: BulkOperation,
        limit: usize,
        count: usize,
    },
    #[error("Unprocessed items: {operation} left {count} items unprocessed")]
    Unprocessed {
        operation: BulkOperation,
        count: usize,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Error reported by the store, unchanged.
    #[error("Store error: {0}")]
    Store(Box<aws_sdk_dynamodb::Error>),
}

impl From<aws_sdk_dynamodb::Error> for RepositoryError {
    fn from(err: aws_sdk_dynamodb::Error) -> Self {
        Self::Store(Box::new(err))
    }
}

impl RepositoryError {
    pub(crate) fn table_not_found(table: &str) -> Self {
        Self::from(aws_sdk_dynamodb::Error::ResourceNotFoundException(
            ResourceNotFoundException::builder()
                .message(format!("Requested resource not found: Table: {table} not found"))
                .build(),
        ))
    }

    pub(crate) fn table_in_use(table: &str) -> Self {
        Self::from(aws_sdk_dynamodb::Error::ResourceInUseException(
            ResourceInUseException::builder()
                .message(format!("Table already exists: {table}"))
                .build(),
        ))
    }

    /// Whether the store reported a missing table or index.
    pub fn is_resource_not_found(&self) -> bool {
        matches!(
            self,
            Self::Store(err) if matches!(**err, aws_sdk_dynamodb::Error::ResourceNotFoundException(_))
        )
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
