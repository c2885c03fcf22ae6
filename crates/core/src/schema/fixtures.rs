//! Record types shared by the schema tests.

use std::sync::Arc;

use crate::converter::CompressionConverter;
use crate::error::Result;
use crate::schema::{ConstructorArgs, FieldDescriptor, FieldType, Record, RecordDescriptor};
use crate::value::{Fields, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct MessageThread {
    pub pk: String,
    pub thread_no: i64,
    pub author: String,
    pub subject: Option<String>,
}

impl Record for MessageThread {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("MessageThread")
            .field(FieldDescriptor::new("pk", FieldType::String).partition_key())
            .field(
                FieldDescriptor::new("thread_no", FieldType::Int)
                    .rename("threadNo")
                    .sort_key()
                    .secondary_sort_key(["by-author"]),
            )
            .field(FieldDescriptor::new("author", FieldType::String).secondary_partition_key(["by-author"]))
            .field(
                FieldDescriptor::new("subject", FieldType::String)
                    .nullable()
                    .secondary_sort_key(["by-subject"]),
            )
            .constructor(["pk", "thread_no", "author", "subject"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("pk", &self.pk)
            .with("thread_no", self.thread_no)
            .with("author", &self.author)
            .with("subject", self.subject.clone())
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            pk: args.take("pk")?,
            thread_no: args.take("thread_no")?,
            author: args.take("author")?,
            subject: args.take("subject")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: &str, children: Vec<Node>) -> Self {
        Self {
            name: name.to_string(),
            children,
        }
    }

    pub fn leaf(name: &str) -> Self {
        Self::new(name, Vec::new())
    }
}

impl Record for Node {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Node")
            .field(FieldDescriptor::new("name", FieldType::String).partition_key())
            .field(FieldDescriptor::new("children", FieldType::list(FieldType::record::<Node>())))
            .constructor(["name", "children"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("name", &self.name)
            .with("children", Value::records(&self.children))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            name: args.take("name")?,
            children: args.take_records("children")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub id: String,
    pub team: Option<Team>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub name: String,
    pub lead: Option<Box<Employee>>,
}

impl Record for Employee {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Employee")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(FieldDescriptor::new("team", FieldType::record::<Team>()).nullable())
            .constructor(["id", "team"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("id", &self.id)
            .with("team", Value::optional_record(self.team.as_ref()))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            id: args.take("id")?,
            team: args.take_optional_record("team")?,
        })
    }
}

impl Record for Team {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Team")
            .field(FieldDescriptor::new("name", FieldType::String))
            .field(FieldDescriptor::new("lead", FieldType::record::<Employee>()).nullable())
            .constructor(["name", "lead"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("name", &self.name)
            .with("lead", Value::optional_record(self.lead.as_deref()))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            name: args.take("name")?,
            lead: args.take_optional_record::<Employee>("lead")?.map(Box::new),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: Option<String>,
}

impl Record for Address {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Address")
            .field(FieldDescriptor::new("street", FieldType::String))
            .field(FieldDescriptor::new("city", FieldType::String).nullable())
            .constructor(["street", "city"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("street", &self.street)
            .with("city", self.city.clone())
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            street: args.take("street")?,
            city: args.take("city")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: String,
    pub address: Option<Address>,
}

impl Record for Customer {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Customer")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(
                FieldDescriptor::new("address", FieldType::record::<Address>())
                    .nullable()
                    .flatten(),
            )
            .constructor(["id", "address"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("id", &self.id)
            .with("address", Value::optional_record(self.address.as_ref()))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            id: args.take("id")?,
            address: args.take_optional_record("address")?,
        })
    }
}

/// Its own `street` collides with the flattened address.
pub struct Clashing;

impl Record for Clashing {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Clashing")
            .field(FieldDescriptor::new("street", FieldType::String).partition_key())
            .field(FieldDescriptor::new("address", FieldType::record::<Address>()).flatten())
            .constructor(["street", "address"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
    }

    fn construct(_: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenantKey {
    pub tenant_id: String,
}

impl Record for TenantKey {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("TenantKey")
            .field(FieldDescriptor::new("tenant_id", FieldType::String).partition_key())
            .constructor(["tenant_id"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new().with("tenant_id", &self.tenant_id)
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            tenant_id: args.take("tenant_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tenanted {
    pub tenant: TenantKey,
    pub body: String,
}

impl Record for Tenanted {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Tenanted")
            .field(FieldDescriptor::new("tenant", FieldType::record::<TenantKey>()).flatten())
            .field(FieldDescriptor::new("body", FieldType::String))
            .constructor(["tenant", "body"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("tenant", Value::record(&self.tenant))
            .with("body", &self.body)
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            tenant: args.take_record("tenant")?,
            body: args.take("body")?,
        })
    }
}

pub struct SelfFlattening;

impl Record for SelfFlattening {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("SelfFlattening")
            .field(FieldDescriptor::new("id", FieldType::String))
            .field(
                FieldDescriptor::new("inner", FieldType::record::<SelfFlattening>())
                    .nullable()
                    .flatten(),
            )
            .constructor(["id", "inner"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
    }

    fn construct(_: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self)
    }
}

pub struct WrongArity;

impl Record for WrongArity {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("WrongArity")
            .field(FieldDescriptor::new("a", FieldType::String))
            .field(FieldDescriptor::new("b", FieldType::String))
            .constructor(["a"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
    }

    fn construct(_: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self)
    }
}

pub struct NoConstructor;

impl Record for NoConstructor {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("NoConstructor").field(FieldDescriptor::new("id", FieldType::String))
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
    }

    fn construct(_: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self)
    }
}

pub struct BoolKey;

impl Record for BoolKey {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("BoolKey")
            .field(FieldDescriptor::new("flag", FieldType::Bool).partition_key())
            .constructor(["flag"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
    }

    fn construct(_: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self)
    }
}

pub struct TwoPartitionKeys;

impl Record for TwoPartitionKeys {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("TwoPartitionKeys")
            .field(FieldDescriptor::new("a", FieldType::String).partition_key())
            .field(FieldDescriptor::new("b", FieldType::String).partition_key())
            .constructor(["a", "b"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
    }

    fn construct(_: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self)
    }
}

pub struct MismatchedConverter;

impl Record for MismatchedConverter {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("MismatchedConverter")
            .field(
                FieldDescriptor::new("id", FieldType::String)
                    .converted_by(Arc::new(CompressionConverter::default())),
            )
            .constructor(["id"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
    }

    fn construct(_: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithIgnored {
    pub id: String,
    pub cached: i64,
}

impl Record for WithIgnored {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("WithIgnored")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(FieldDescriptor::new("cached", FieldType::Int).ignore())
            .constructor(["id"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new().with("id", &self.id).with("cached", self.cached)
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            id: args.take("id")?,
            cached: 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blobby {
    pub id: String,
    pub payload: Vec<u8>,
}

impl Record for Blobby {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Blobby")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(FieldDescriptor::new("payload", FieldType::Bytes))
            .constructor(["id", "payload"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("id", &self.id)
            .with("payload", Value::bytes(self.payload.clone()))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            id: args.take("id")?,
            payload: args.take_bytes("payload")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Nested {
    pub note: Option<String>,
}

impl Record for Nested {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Nested")
            .field(FieldDescriptor::new("note", FieldType::String).nullable())
            .constructor(["note"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new().with("note", self.note.clone())
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            note: args.take("note")?,
        })
    }
}

/// `kept` preserves empty nested documents, `dropped` does not.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub id: String,
    pub kept: Option<Nested>,
    pub dropped: Option<Nested>,
}

impl Record for Container {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Container")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(
                FieldDescriptor::new("kept", FieldType::record::<Nested>())
                    .nullable()
                    .preserve_empty_object(),
            )
            .field(FieldDescriptor::new("dropped", FieldType::record::<Nested>()).nullable())
            .constructor(["id", "kept", "dropped"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("id", &self.id)
            .with("kept", Value::optional_record(self.kept.as_ref()))
            .with("dropped", Value::optional_record(self.dropped.as_ref()))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            id: args.take("id")?,
            kept: args.take_optional_record("kept")?,
            dropped: args.take_optional_record("dropped")?,
        })
    }
}

/// `meta` is flattened and required, but every field of it is nullable.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated {
    pub id: String,
    pub meta: Nested,
}

impl Record for Annotated {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Annotated")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(FieldDescriptor::new("meta", FieldType::record::<Nested>()).flatten())
            .constructor(["id", "meta"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("id", &self.id)
            .with("meta", Value::record(&self.meta))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            id: args.take("id")?,
            meta: args.take_record("meta")?,
        })
    }
}

/// The first write of `hits` cannot be expressed as `(start - delta) + delta`.
pub struct OverflowingCounter;

impl Record for OverflowingCounter {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("OverflowingCounter")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(FieldDescriptor::new("hits", FieldType::Int).atomic_counter(1, i64::MIN))
            .constructor(["id", "hits"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
    }

    fn construct(_: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self)
    }
}

/// Required embedded records: `kept` preserves an empty document, `bare` does not.
#[derive(Debug, Clone, PartialEq)]
pub struct Enveloped {
    pub id: String,
    pub kept: Nested,
    pub bare: Nested,
}

impl Record for Enveloped {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Enveloped")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(FieldDescriptor::new("kept", FieldType::record::<Nested>()).preserve_empty_object())
            .field(FieldDescriptor::new("bare", FieldType::record::<Nested>()))
            .constructor(["id", "kept", "bare"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("id", &self.id)
            .with("kept", Value::record(&self.kept))
            .with("bare", Value::record(&self.bare))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            id: args.take("id")?,
            kept: args.take_record("kept")?,
            bare: args.take_record("bare")?,
        })
    }
}
