use crate::error::{MappingError, Result};
use crate::schema::descriptor::{short_type_name, Record};
use crate::schema::table::TableSchema;
use crate::value::{Fields, FromValue, Value};

/// Accumulates field values and builds a record through its designated constructor.
pub struct RecordBuilder<'a, T> {
    schema: &'a TableSchema<T>,
    fields: Fields,
}

impl<'a, T: Record> RecordBuilder<'a, T> {
    pub(crate) fn new(schema: &'a TableSchema<T>) -> Self {
        Self {
            schema,
            fields: Fields::new(),
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field, value);
        self
    }

    /// Builds the record. Fails if a required field was never set.
    pub fn build(self) -> Result<T> {
        self.schema.build(self.fields)
    }
}

/// Arguments handed to [`Record::construct`], one per mapped field.
#[derive(Debug)]
pub struct ConstructorArgs {
    record: &'static str,
    values: Fields,
}

impl ConstructorArgs {
    pub(crate) fn new(record: &'static str, values: Fields) -> Self {
        Self { record, values }
    }

    fn remove(&mut self, name: &str) -> Result<Value> {
        self.values.remove(name).ok_or_else(|| {
            MappingError::config(
                self.record,
                format!("constructor parameter `{name}` is not a mapped field"),
            )
        })
    }

    pub fn take<T: FromValue>(&mut self, name: &str) -> Result<T> {
        let value = self.remove(name)?;
        T::from_value(value).map_err(|e| e.at(self.record, name))
    }

    pub fn take_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        match self.remove(name)? {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(other.mismatch("bytes").at(self.record, name)),
        }
    }

    pub fn take_optional_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.remove(name)? {
            Value::Null => Ok(None),
            Value::Bytes(bytes) => Ok(Some(bytes)),
            other => Err(other.mismatch("bytes").at(self.record, name)),
        }
    }

    pub fn take_record<R: Record>(&mut self, name: &str) -> Result<R> {
        let value = self.remove(name)?;
        nested(value).map_err(|e| e.at(self.record, name))
    }

    pub fn take_optional_record<R: Record>(&mut self, name: &str) -> Result<Option<R>> {
        match self.remove(name)? {
            Value::Null => Ok(None),
            value => nested(value).map(Some).map_err(|e| e.at(self.record, name)),
        }
    }

    pub fn take_records<R: Record>(&mut self, name: &str) -> Result<Vec<R>> {
        match self.remove(name)? {
            Value::List(values) => values
                .into_iter()
                .map(nested)
                .collect::<Result<Vec<_>>>()
                .map_err(|e| e.at(self.record, name)),
            other => Err(other.mismatch("list").at(self.record, name)),
        }
    }
}

fn nested<R: Record>(value: Value) -> Result<R> {
    match value {
        Value::Record(fields) => R::construct(&mut ConstructorArgs::new(short_type_name::<R>(), fields)),
        other => Err(other.mismatch("record")),
    }
}
