use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::converter::{AttributeConverter, AttributeKind};
use crate::error::{MappingError, Result};
use crate::key::Key;
use crate::schema::builder::{ConstructorArgs, RecordBuilder};
use crate::schema::descriptor::{AtomicCounter, FieldType, KeyRole, Record, UpdateBehavior};
use crate::value::{Fields, Value};
use crate::Item;

/// How one field value becomes an attribute value.
#[derive(Debug, Clone)]
pub(crate) enum Encoder {
    Converter(Arc<dyn AttributeConverter>),
    List(Box<Encoder>),
    /// Element converter of a string, number or binary set.
    Set(Arc<dyn AttributeConverter>),
    Map(Box<Encoder>),
    /// Nested record, by arena slot.
    Record {
        layout: usize,
        preserve_empty_object: bool,
    },
}

impl Encoder {
    fn encode(&self, value: &Value, layouts: &Layouts) -> Result<AttributeValue> {
        if value.is_null() {
            return Ok(AttributeValue::Null(true));
        }

        match self {
            Self::Converter(converter) => converter.encode(value),
            Self::List(element) => match value {
                Value::List(values) => values
                    .iter()
                    .map(|v| element.encode(v, layouts))
                    .collect::<Result<Vec<_>>>()
                    .map(AttributeValue::L),
                other => Err(other.mismatch("list")),
            },
            Self::Map(element) => match value {
                Value::Map(values) => values
                    .iter()
                    .map(|(k, v)| element.encode(v, layouts).map(|v| (k.clone(), v)))
                    .collect::<Result<HashMap<_, _>>>()
                    .map(AttributeValue::M),
                other => Err(other.mismatch("map")),
            },
            Self::Set(element) => encode_set(element.as_ref(), value),
            Self::Record { layout, .. } => match value {
                Value::Record(fields) => {
                    let mut item = HashMap::new();
                    layouts.encode_fields(*layout, fields, &mut item)?;
                    Ok(AttributeValue::M(item))
                }
                other => Err(other.mismatch("record")),
            },
        }
    }

    fn decode(&self, attribute: &AttributeValue, layouts: &Layouts) -> Result<Value> {
        if let AttributeValue::Null(true) = attribute {
            return Ok(Value::Null);
        }

        match self {
            Self::Converter(converter) => converter.decode(attribute),
            Self::List(element) => match attribute {
                AttributeValue::L(values) => values
                    .iter()
                    .map(|v| element.decode(v, layouts))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                other => Err(unexpected(AttributeKind::L, other)),
            },
            Self::Map(element) => match attribute {
                AttributeValue::M(values) => values
                    .iter()
                    .map(|(k, v)| element.decode(v, layouts).map(|v| (k.clone(), v)))
                    .collect::<Result<BTreeMap<_, _>>>()
                    .map(Value::Map),
                other => Err(unexpected(AttributeKind::M, other)),
            },
            Self::Set(element) => decode_set(element.as_ref(), attribute),
            Self::Record {
                layout,
                preserve_empty_object,
            } => match attribute {
                AttributeValue::M(item) => {
                    let preserve = *preserve_empty_object || layouts.get(*layout).preserve_empty_object;
                    if item.is_empty() && !preserve {
                        return Ok(Value::Null);
                    }
                    layouts.decode_fields(*layout, item).map(Value::Record)
                }
                other => Err(unexpected(AttributeKind::M, other)),
            },
        }
    }
}

fn unexpected(expected: AttributeKind, attribute: &AttributeValue) -> MappingError {
    MappingError::format(format!(
        "expected {expected} attribute, got {:?}",
        AttributeKind::of(attribute)
    ))
}

/// Sets cannot be empty in the store, so an empty set is written as absent.
fn encode_set(element: &dyn AttributeConverter, value: &Value) -> Result<AttributeValue> {
    let values = match value {
        Value::Set(values) | Value::List(values) => values,
        other => return Err(other.mismatch("set")),
    };
    if values.is_empty() {
        return Ok(AttributeValue::Null(true));
    }

    let mut literals: Vec<String> = Vec::with_capacity(values.len());
    let mut blobs = Vec::new();
    for value in values {
        if value.is_null() {
            return Err(MappingError::format("sets cannot contain null"));
        }
        match element.encode(value)? {
            AttributeValue::S(s) | AttributeValue::N(s) => {
                if !literals.contains(&s) {
                    literals.push(s);
                }
            }
            AttributeValue::B(b) => {
                if !blobs.contains(&b) {
                    blobs.push(b);
                }
            }
            other => return Err(unexpected(element.attribute_kind(), &other)),
        }
    }

    Ok(match element.attribute_kind() {
        AttributeKind::S => AttributeValue::Ss(literals),
        AttributeKind::N => AttributeValue::Ns(literals),
        _ => AttributeValue::Bs(blobs),
    })
}

fn decode_set(element: &dyn AttributeConverter, attribute: &AttributeValue) -> Result<Value> {
    let values = match (element.attribute_kind(), attribute) {
        (AttributeKind::S, AttributeValue::Ss(values)) => values
            .iter()
            .map(|s| element.decode(&AttributeValue::S(s.clone())))
            .collect::<Result<Vec<_>>>()?,
        (AttributeKind::N, AttributeValue::Ns(values)) => values
            .iter()
            .map(|n| element.decode(&AttributeValue::N(n.clone())))
            .collect::<Result<Vec<_>>>()?,
        (AttributeKind::B, AttributeValue::Bs(values)) => values
            .iter()
            .map(|b| element.decode(&AttributeValue::B(b.clone())))
            .collect::<Result<Vec<_>>>()?,
        (kind, other) => {
            return Err(MappingError::format(format!(
                "expected set of {kind}, got {:?}",
                AttributeKind::of(other)
            )))
        }
    };
    Ok(Value::Set(values))
}

/// A mapped, non-flattened field.
#[derive(Debug, Clone)]
pub struct AttributeMapping {
    pub(crate) field: String,
    pub(crate) attribute: String,
    pub(crate) field_type: FieldType,
    pub(crate) nullable: bool,
    pub(crate) roles: Vec<KeyRole>,
    pub(crate) update_behavior: UpdateBehavior,
    pub(crate) atomic_counter: Option<AtomicCounter>,
    pub(crate) encoder: Encoder,
}

impl AttributeMapping {
    pub fn field_name(&self) -> &str {
        &self.field
    }

    pub fn attribute_name(&self) -> &str {
        &self.attribute
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn roles(&self) -> &[KeyRole] {
        &self.roles
    }

    /// Whether the attribute is part of the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.roles
            .iter()
            .any(|role| matches!(role, KeyRole::Partition | KeyRole::Sort))
    }

    pub fn update_behavior(&self) -> UpdateBehavior {
        self.update_behavior
    }

    pub fn atomic_counter(&self) -> Option<AtomicCounter> {
        self.atomic_counter
    }

    /// Stored kind, for scalar attributes.
    pub fn attribute_kind(&self) -> Option<AttributeKind> {
        match &self.encoder {
            Encoder::Converter(converter) => Some(converter.attribute_kind()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FlattenedField {
    pub(crate) field: String,
    pub(crate) layout: usize,
    pub(crate) nullable: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum FieldMapping {
    Attribute(AttributeMapping),
    Flattened(FlattenedField),
}

impl FieldMapping {
    fn field(&self) -> &str {
        match self {
            Self::Attribute(a) => &a.field,
            Self::Flattened(f) => &f.field,
        }
    }
}

/// Compiled layout of one record type, fields in constructor order.
#[derive(Debug, Clone)]
pub(crate) struct RecordLayout {
    pub(crate) name: &'static str,
    pub(crate) fields: Vec<FieldMapping>,
    pub(crate) preserve_empty_object: bool,
}

/// Every record layout reached from a root type. Slot 0 is the root.
#[derive(Debug, Clone)]
pub(crate) struct Layouts(pub(crate) Vec<RecordLayout>);

impl Layouts {
    pub(crate) const ROOT: usize = 0;

    pub(crate) fn get(&self, index: usize) -> &RecordLayout {
        &self.0[index]
    }

    pub(crate) fn encode_fields(&self, index: usize, fields: &Fields, item: &mut Item) -> Result<()> {
        let layout = self.get(index);
        for mapping in &layout.fields {
            match mapping {
                FieldMapping::Attribute(a) => {
                    let value = fields.get(&a.field).unwrap_or(&Value::Null);
                    let encoded = a
                        .encoder
                        .encode(value, self)
                        .map_err(|e| e.at(layout.name, &a.field))?;
                    if encoded != AttributeValue::Null(true) {
                        item.insert(a.attribute.clone(), encoded);
                    }
                }
                FieldMapping::Flattened(f) => match fields.get(&f.field) {
                    Some(Value::Record(child)) => self.encode_fields(f.layout, child, item)?,
                    None | Some(Value::Null) => {}
                    Some(other) => return Err(other.mismatch("record").at(layout.name, &f.field)),
                },
            }
        }
        Ok(())
    }

    pub(crate) fn decode_fields(&self, index: usize, item: &Item) -> Result<Fields> {
        let layout = self.get(index);
        let mut fields = Fields::new();
        for mapping in &layout.fields {
            match mapping {
                FieldMapping::Attribute(a) => {
                    if let Some(attribute) = item.get(&a.attribute) {
                        let value = a
                            .encoder
                            .decode(attribute, self)
                            .map_err(|e| e.at(layout.name, &a.field))?;
                        fields.insert(a.field.clone(), value);
                    }
                }
                FieldMapping::Flattened(f) => {
                    // A required flattened record whose fields are all null writes nothing.
                    let present = !f.nullable
                        || self
                            .attribute_names(f.layout)
                            .iter()
                            .any(|name| item.contains_key(*name));
                    if present {
                        let child = self.decode_fields(f.layout, item)?;
                        fields.insert(f.field.clone(), Value::Record(child));
                    }
                }
            }
        }
        self.finalize(index, fields)
    }

    /// Fills absent fields: null when nullable, empty for sets, null for documents.
    pub(crate) fn finalize(&self, index: usize, mut fields: Fields) -> Result<Fields> {
        let layout = self.get(index);
        for mapping in &layout.fields {
            let name = mapping.field();
            if fields.get(name).is_some_and(|v| !v.is_null()) {
                continue;
            }
            let default = match mapping {
                FieldMapping::Attribute(a) if a.nullable => Value::Null,
                FieldMapping::Attribute(a) => match a.field_type {
                    FieldType::Set(_) => Value::Set(Vec::new()),
                    FieldType::Document => Value::Document(serde_json::Value::Null),
                    _ => return Err(required(layout.name, name)),
                },
                FieldMapping::Flattened(f) if f.nullable => Value::Null,
                FieldMapping::Flattened(_) => return Err(required(layout.name, name)),
            };
            fields.insert(name, default);
        }
        Ok(fields)
    }

    /// Attribute names of a layout, flattened children included.
    pub(crate) fn attribute_names(&self, index: usize) -> Vec<&str> {
        let mut names = Vec::new();
        for mapping in &self.get(index).fields {
            match mapping {
                FieldMapping::Attribute(a) => names.push(a.attribute.as_str()),
                FieldMapping::Flattened(f) => names.extend(self.attribute_names(f.layout)),
            }
        }
        names
    }

    /// Attribute mappings of a layout, flattened children included.
    pub(crate) fn attributes(&self, index: usize) -> Vec<&AttributeMapping> {
        let mut mappings = Vec::new();
        for mapping in &self.get(index).fields {
            match mapping {
                FieldMapping::Attribute(a) => mappings.push(a),
                FieldMapping::Flattened(f) => mappings.extend(self.attributes(f.layout)),
            }
        }
        mappings
    }
}

fn required(record: &'static str, field: &str) -> MappingError {
    MappingError::config(record, format!("required field `{field}` was never populated"))
}

/// A primary or index key attribute.
#[derive(Debug, Clone)]
pub struct KeyAttribute {
    pub(crate) attribute: String,
    /// Field names from the root record down to the key field.
    pub(crate) path: Vec<String>,
    pub(crate) converter: Arc<dyn AttributeConverter>,
}

impl KeyAttribute {
    pub fn attribute_name(&self) -> &str {
        &self.attribute
    }

    pub fn field_path(&self) -> &[String] {
        &self.path
    }

    pub fn kind(&self) -> AttributeKind {
        self.converter.attribute_kind()
    }

    fn encode(&self, value: Option<&Value>, component: &str) -> Result<AttributeValue> {
        match value {
            Some(value) if !value.is_null() => self
                .converter
                .encode(value)
                .map_err(|e| e.at("key", &self.attribute)),
            _ => Err(MappingError::format(format!(
                "{component} key `{}` has no value",
                self.attribute
            ))),
        }
    }

    fn lookup<'a>(&self, fields: &'a Fields) -> Option<&'a Value> {
        let (last, parents) = self.path.split_last()?;
        let mut current = fields;
        for parent in parents {
            match current.get(parent) {
                Some(Value::Record(child)) => current = child,
                _ => return None,
            }
        }
        current.get(last)
    }
}

/// A secondary index declared by key role tags.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub(crate) name: String,
    pub(crate) partition_key: KeyAttribute,
    pub(crate) sort_key: Option<KeyAttribute>,
    pub(crate) global: bool,
}

impl IndexDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_key(&self) -> &KeyAttribute {
        &self.partition_key
    }

    pub fn sort_key(&self) -> Option<&KeyAttribute> {
        self.sort_key.as_ref()
    }

    /// Global when its partition key differs from the table's, local otherwise.
    pub fn is_global(&self) -> bool {
        self.global
    }
}

/// Compiled mapping between `T` and store items. Immutable and shared.
pub struct TableSchema<T> {
    pub(crate) record_name: &'static str,
    pub(crate) table_name: String,
    pub(crate) layouts: Layouts,
    pub(crate) partition_key: Option<KeyAttribute>,
    pub(crate) sort_key: Option<KeyAttribute>,
    pub(crate) indices: Vec<IndexDefinition>,
    pub(crate) _record: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for TableSchema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSchema")
            .field("record_name", &self.record_name)
            .field("table_name", &self.table_name)
            .field("partition_key", &self.partition_key)
            .field("sort_key", &self.sort_key)
            .field("indices", &self.indices)
            .finish_non_exhaustive()
    }
}

impl<T: Record> TableSchema<T> {
    pub fn record_name(&self) -> &'static str {
        self.record_name
    }

    /// Table name override, else the record type name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn partition_key(&self) -> Option<&KeyAttribute> {
        self.partition_key.as_ref()
    }

    pub fn sort_key(&self) -> Option<&KeyAttribute> {
        self.sort_key.as_ref()
    }

    pub fn indices(&self) -> &[IndexDefinition] {
        &self.indices
    }

    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indices.iter().find(|index| index.name == name)
    }

    /// Top level attribute mappings, flattened records spliced in.
    pub fn attributes(&self) -> Vec<&AttributeMapping> {
        self.layouts.attributes(Layouts::ROOT)
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.layouts.attribute_names(Layouts::ROOT)
    }

    /// Encodes a record. Null fields are omitted.
    pub fn to_item(&self, record: &T) -> Result<Item> {
        let mut item = HashMap::new();
        self.layouts
            .encode_fields(Layouts::ROOT, &record.to_fields(), &mut item)?;
        Ok(item)
    }

    pub fn from_item(&self, item: &Item) -> Result<T> {
        let fields = self.layouts.decode_fields(Layouts::ROOT, item)?;
        T::construct(&mut ConstructorArgs::new(self.record_name, fields))
    }

    /// Reads the primary key of a record.
    pub fn key_of(&self, record: &T) -> Result<Key> {
        let partition_key = self.require_partition_key()?;
        let fields = record.to_fields();

        let partition = partition_key.lookup(&fields).cloned().unwrap_or_default();
        let sort = self
            .sort_key
            .as_ref()
            .map(|sort_key| sort_key.lookup(&fields).cloned().unwrap_or_default());

        Ok(Key { partition, sort })
    }

    /// Encodes a key into the item holding only the primary key attributes.
    pub fn key_item(&self, key: &Key) -> Result<Item> {
        let partition_key = self.require_partition_key()?;
        let mut item = HashMap::with_capacity(2);
        item.insert(
            partition_key.attribute.clone(),
            partition_key.encode(Some(&key.partition), "partition")?,
        );

        match (&self.sort_key, &key.sort) {
            (Some(sort_key), sort) => {
                item.insert(
                    sort_key.attribute.clone(),
                    sort_key.encode(sort.as_ref(), "sort")?,
                );
            }
            (None, Some(_)) => {
                return Err(MappingError::format(format!(
                    "{} has no sort key but the key has a sort value",
                    self.record_name
                )))
            }
            (None, None) => {}
        }
        Ok(item)
    }

    /// Encodes a single sort key value, for range conditions.
    pub fn encode_sort_value(&self, value: &Value) -> Result<AttributeValue> {
        let sort_key = self.sort_key.as_ref().ok_or_else(|| {
            MappingError::format(format!("{} has no sort key", self.record_name))
        })?;
        sort_key.encode(Some(value), "sort")
    }

    /// Encodes a single key value with the converter of the given key attribute.
    pub fn encode_key_value(&self, key: &KeyAttribute, value: &Value) -> Result<AttributeValue> {
        key.encode(Some(value), "index")
    }

    pub fn new_builder(&self) -> RecordBuilder<'_, T> {
        RecordBuilder::new(self)
    }

    pub(crate) fn build(&self, fields: Fields) -> Result<T> {
        let layout = self.layouts.get(Layouts::ROOT);
        if let Some(unknown) = fields
            .names()
            .find(|name| !layout.fields.iter().any(|m| m.field() == *name))
        {
            return Err(MappingError::format(format!(
                "{} has no mapped field `{unknown}`",
                self.record_name
            )));
        }
        let fields = self.layouts.finalize(Layouts::ROOT, fields)?;
        T::construct(&mut ConstructorArgs::new(self.record_name, fields))
    }

    fn require_partition_key(&self) -> Result<&KeyAttribute> {
        self.partition_key.as_ref().ok_or_else(|| {
            MappingError::config(self.record_name, "no partition key is declared")
        })
    }
}
