//! Record type descriptors.
//!
//! A record type registers itself once through [`Record::descriptor`]: its fields, their declared
//! types, per-field configuration and the parameter list of its designated constructor. The
//! compiler reads nothing else.

use std::any::{self, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::converter::AttributeConverter;
use crate::error::Result;
use crate::schema::ConstructorArgs;
use crate::value::Fields;

/// An immutable application record mapped to store items.
pub trait Record: Sized + Send + Sync + 'static {
    /// Describes the record's fields and designated constructor.
    fn descriptor() -> RecordDescriptor;

    /// Current field values, keyed by field name.
    fn to_fields(&self) -> Fields;

    /// The designated constructor.
    fn construct(args: &mut ConstructorArgs) -> Result<Self>;
}

/// A lazily resolved reference to a record type.
///
/// Holding a reference never calls the referenced descriptor, so self-referential descriptors can
/// be declared.
#[derive(Clone, Copy)]
pub struct RecordRef {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) descriptor: fn() -> RecordDescriptor,
}

impl RecordRef {
    pub fn of<R: Record>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            type_name: short_type_name::<R>(),
            descriptor: R::descriptor,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for RecordRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for RecordRef {}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordRef").field(&self.type_name).finish()
    }
}

pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Declared type of a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Bool,
    Int,
    Float,
    Bytes,
    /// Opaque JSON-like document.
    Document,
    List(Box<FieldType>),
    Set(Box<FieldType>),
    /// String-keyed map.
    Map(Box<FieldType>),
    Record(RecordRef),
}

impl FieldType {
    pub fn list(element: FieldType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: FieldType) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(value: FieldType) -> Self {
        Self::Map(Box::new(value))
    }

    pub fn record<R: Record>() -> Self {
        Self::Record(RecordRef::of::<R>())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("String"),
            Self::Bool => f.write_str("Bool"),
            Self::Int => f.write_str("Int"),
            Self::Float => f.write_str("Float"),
            Self::Bytes => f.write_str("Bytes"),
            Self::Document => f.write_str("Document"),
            Self::List(element) => write!(f, "List<{element}>"),
            Self::Set(element) => write!(f, "Set<{element}>"),
            Self::Map(value) => write!(f, "Map<String, {value}>"),
            Self::Record(record) => f.write_str(record.type_name),
        }
    }
}

/// Key role tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRole {
    Partition,
    Sort,
    /// Partition key of the named secondary indices.
    SecondaryPartition(Vec<String>),
    /// Sort key of the named secondary indices.
    SecondarySort(Vec<String>),
}

/// How `save` writes an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateBehavior {
    #[default]
    WriteAlways,
    /// Only written when the stored item does not have the attribute yet.
    WriteIfNotExists,
}

/// A numeric attribute incremented by the store on every save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicCounter {
    pub delta: i64,
    pub start: i64,
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self { delta: 1, start: 0 }
    }
}

/// One field of a record type and its mapping configuration.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) field_type: FieldType,
    pub(crate) nullable: bool,
    pub(crate) attribute_name: Option<String>,
    pub(crate) converter: Option<Arc<dyn AttributeConverter>>,
    pub(crate) roles: Vec<KeyRole>,
    pub(crate) update_behavior: UpdateBehavior,
    pub(crate) atomic_counter: Option<AtomicCounter>,
    pub(crate) flatten: bool,
    pub(crate) preserve_empty_object: bool,
    pub(crate) ignore: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            attribute_name: None,
            converter: None,
            roles: Vec::new(),
            update_behavior: UpdateBehavior::default(),
            atomic_counter: None,
            flatten: false,
            preserve_empty_object: false,
            ignore: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Stores the field under a different attribute name.
    pub fn rename(mut self, attribute_name: impl Into<String>) -> Self {
        self.attribute_name = Some(attribute_name.into());
        self
    }

    /// Overrides the converter resolved from the declared type.
    pub fn converted_by(mut self, converter: Arc<dyn AttributeConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn partition_key(mut self) -> Self {
        self.roles.push(KeyRole::Partition);
        self
    }

    pub fn sort_key(mut self) -> Self {
        self.roles.push(KeyRole::Sort);
        self
    }

    pub fn secondary_partition_key<I, S>(mut self, index_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = index_names.into_iter().map(Into::into).collect();
        self.roles.push(KeyRole::SecondaryPartition(names));
        self
    }

    pub fn secondary_sort_key<I, S>(mut self, index_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = index_names.into_iter().map(Into::into).collect();
        self.roles.push(KeyRole::SecondarySort(names));
        self
    }

    pub fn write_if_not_exists(mut self) -> Self {
        self.update_behavior = UpdateBehavior::WriteIfNotExists;
        self
    }

    pub fn atomic_counter(mut self, delta: i64, start: i64) -> Self {
        self.atomic_counter = Some(AtomicCounter { delta, start });
        self
    }

    /// Splices the nested record's attributes into the parent item.
    pub fn flatten(mut self) -> Self {
        self.flatten = true;
        self
    }

    /// Decodes an empty nested document as a record with all fields null instead of as null.
    ///
    /// A record whose fields are all null is written as an empty document. Without this flag
    /// that document reads back as absent, which fails the build of a non-nullable field, so
    /// required embedded records that may be empty need it.
    pub fn preserve_empty_object(mut self) -> Self {
        self.preserve_empty_object = true;
        self
    }

    /// Leaves the field unmapped. The constructor must not take it.
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }
}

/// Describes a record type.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub(crate) name: &'static str,
    pub(crate) table_name: Option<String>,
    pub(crate) preserve_empty_object: bool,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) constructor: Option<Vec<String>>,
}

impl RecordDescriptor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            table_name: None,
            preserve_empty_object: false,
            fields: Vec::new(),
            constructor: None,
        }
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Applies preserve-empty-object wherever this record is embedded.
    pub fn preserve_empty_object(mut self) -> Self {
        self.preserve_empty_object = true;
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares the designated constructor by its parameter names, in order.
    pub fn constructor<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constructor = Some(parameters.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}
