//! Cardinality limits the store imposes on bulk operations.
//!
//! Checked before any request is sent.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};

pub const MAX_TRANSACTION_GET_ITEMS: usize = 100;
pub const MAX_TRANSACTION_SAVE_ITEMS: usize = 100;
pub const MAX_TRANSACTION_DELETE_ITEMS: usize = 100;
pub const MAX_BATCH_GET_ITEMS: usize = 100;
pub const MAX_BATCH_SAVE_ITEMS: usize = 25;
pub const MAX_BATCH_DELETE_ITEMS: usize = 25;

/// A multi-item operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulkOperation {
    TransactionGet,
    TransactionSave,
    TransactionDelete,
    BatchGet,
    BatchSave,
    BatchDelete,
}

impl BulkOperation {
    pub fn limit(self) -> usize {
        match self {
            Self::TransactionGet => MAX_TRANSACTION_GET_ITEMS,
            Self::TransactionSave => MAX_TRANSACTION_SAVE_ITEMS,
            Self::TransactionDelete => MAX_TRANSACTION_DELETE_ITEMS,
            Self::BatchGet => MAX_BATCH_GET_ITEMS,
            Self::BatchSave => MAX_BATCH_SAVE_ITEMS,
            Self::BatchDelete => MAX_BATCH_DELETE_ITEMS,
        }
    }

    /// Fails with `LimitExceeded` when `count` is above the limit.
    pub fn check(self, count: usize) -> Result<()> {
        let limit = self.limit();
        if count > limit {
            return Err(RepositoryError::LimitExceeded {
                operation: self,
                limit,
                count,
            });
        }
        Ok(())
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TransactionGet => "transaction get",
            Self::TransactionSave => "transaction save",
            Self::TransactionDelete => "transaction delete",
            Self::BatchGet => "batch get",
            Self::BatchSave => "batch save",
            Self::BatchDelete => "batch delete",
        };
        f.write_str(name)
    }
}
