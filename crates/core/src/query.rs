//! Page query value objects.

use serde::{Deserialize, Serialize};

use crate::key::Key;
use crate::Item;

/// Sort direction of a page, on the sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn scan_index_forward(self) -> bool {
        matches!(self, Self::Asc)
    }
}

/// Range condition of a page query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryConditional {
    /// Partition equality. A sort value, when given, must match exactly.
    #[default]
    KeyEqualTo,
    SortBeginsWith,
    SortLessThan,
    SortGreaterThan,
}

impl QueryConditional {
    /// Whether the conditional compares the sort component.
    pub fn requires_sort_value(self) -> bool {
        !matches!(self, Self::KeyEqualTo)
    }
}

/// Parameters of one page query. Built per call.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQueryParam {
    pub key: Key,
    pub conditional: QueryConditional,
    pub limit: u32,
    pub sort: SortDirection,
    /// Queries a secondary index instead of the table.
    pub index_name: Option<String>,
    /// Continuation token from a previous page.
    pub exclusive_start_key: Option<Item>,
}

impl PageQueryParam {
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn new(key: Key) -> Self {
        Self {
            key,
            conditional: QueryConditional::default(),
            limit: Self::DEFAULT_LIMIT,
            sort: SortDirection::default(),
            index_name: None,
            exclusive_start_key: None,
        }
    }

    pub fn conditional(mut self, conditional: QueryConditional) -> Self {
        self.conditional = conditional;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn sort(mut self, sort: SortDirection) -> Self {
        self.sort = sort;
        self
    }

    pub fn index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn start_after(mut self, exclusive_start_key: Item) -> Self {
        self.exclusive_start_key = Some(exclusive_start_key);
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Pass to [`PageQueryParam::start_after`] to fetch the next page.
    pub last_evaluated_key: Option<Item>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.last_evaluated_key.is_some()
    }
}
