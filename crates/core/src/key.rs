use crate::value::Value;

/// Primary key of an item: partition value plus optional sort value.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub partition: Value,
    pub sort: Option<Value>,
}

impl Key {
    pub fn new(partition: impl Into<Value>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    pub fn with_sort(mut self, sort: impl Into<Value>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}
