//! Record types shared by the repository tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use dynamap_core::schema::{ConstructorArgs, FieldDescriptor, FieldType, RecordDescriptor};
use dynamap_core::{CompressionConverter, Fields, Record, Value};

type Result<T> = dynamap_core::Result<T>;

/// Forum thread: counters, write-once fields and a global index.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub forum: String,
    pub seq: i64,
    pub author: String,
    pub title: Option<String>,
    pub views: i64,
    pub created: String,
    pub tags: BTreeSet<String>,
}

impl Thread {
    pub fn new(forum: &str, seq: i64, author: &str) -> Self {
        Self {
            forum: forum.to_string(),
            seq,
            author: author.to_string(),
            title: Some("hello".to_string()),
            views: 0,
            created: "2024-01-01".to_string(),
            tags: BTreeSet::from(["intro".to_string(), "meta".to_string()]),
        }
    }
}

impl Record for Thread {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Thread")
            .table_name("threads")
            .field(FieldDescriptor::new("forum", FieldType::String).partition_key())
            .field(FieldDescriptor::new("seq", FieldType::Int).sort_key())
            .field(
                FieldDescriptor::new("author", FieldType::String)
                    .secondary_partition_key(["by-author"]),
            )
            .field(
                FieldDescriptor::new("title", FieldType::String)
                    .nullable()
                    .secondary_sort_key(["by-author"]),
            )
            .field(FieldDescriptor::new("views", FieldType::Int).atomic_counter(1, 0))
            .field(FieldDescriptor::new("created", FieldType::String).write_if_not_exists())
            .field(FieldDescriptor::new("tags", FieldType::set(FieldType::String)))
            .constructor(["forum", "seq", "author", "title", "views", "created", "tags"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("forum", &self.forum)
            .with("seq", self.seq)
            .with("author", &self.author)
            .with("title", self.title.clone())
            .with("views", self.views)
            .with("created", &self.created)
            .with("tags", self.tags.clone())
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            forum: args.take("forum")?,
            seq: args.take("seq")?,
            author: args.take("author")?,
            title: args.take("title")?,
            views: args.take("views")?,
            created: args.take("created")?,
            tags: args.take("tags")?,
        })
    }
}

/// Sensor reading with a numeric sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor: String,
    pub seq: i64,
    pub celsius: f64,
}

impl Record for Reading {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Reading")
            .field(FieldDescriptor::new("sensor", FieldType::String).partition_key())
            .field(FieldDescriptor::new("seq", FieldType::Int).sort_key())
            .field(FieldDescriptor::new("celsius", FieldType::Float))
            .constructor(["sensor", "seq", "celsius"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("sensor", &self.sensor)
            .with("seq", self.seq)
            .with("celsius", self.celsius)
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            sensor: args.take("sensor")?,
            seq: args.take("seq")?,
            celsius: args.take("celsius")?,
        })
    }
}

/// Binary body stored zstd-compressed.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub body: Vec<u8>,
}

impl Record for Attachment {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Attachment")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(
                FieldDescriptor::new("body", FieldType::Bytes)
                    .converted_by(Arc::new(CompressionConverter::default())),
            )
            .constructor(["id", "body"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("id", &self.id)
            .with("body", Value::bytes(self.body.clone()))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            id: args.take("id")?,
            body: args.take_bytes("body")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
}

impl Record for Address {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Address")
            .field(FieldDescriptor::new("street", FieldType::String).nullable())
            .field(FieldDescriptor::new("city", FieldType::String).nullable())
            .constructor(["street", "city"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("street", self.street.clone())
            .with("city", self.city.clone())
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            street: args.take("street")?,
            city: args.take("city")?,
        })
    }
}

/// `home` keeps an empty address, `work` collapses it to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub home: Option<Address>,
    pub work: Option<Address>,
}

impl Profile {
    pub fn with_empty_address(id: &str) -> Self {
        Self {
            id: id.to_string(),
            home: Some(Address::default()),
            work: Some(Address::default()),
        }
    }
}

impl Record for Profile {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Profile")
            .field(FieldDescriptor::new("id", FieldType::String).partition_key())
            .field(
                FieldDescriptor::new("home", FieldType::record::<Address>())
                    .nullable()
                    .preserve_empty_object(),
            )
            .field(FieldDescriptor::new("work", FieldType::record::<Address>()).nullable())
            .constructor(["id", "home", "work"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("id", &self.id)
            .with("home", Value::optional_record(self.home.as_ref()))
            .with("work", Value::optional_record(self.work.as_ref()))
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            id: args.take("id")?,
            home: args.take_optional_record("home")?,
            work: args.take_optional_record("work")?,
        })
    }
}

/// Compiles fine but cannot back a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Unkeyed {
    pub note: String,
}

impl Record for Unkeyed {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Unkeyed")
            .field(FieldDescriptor::new("note", FieldType::String))
            .constructor(["note"])
    }

    fn to_fields(&self) -> Fields {
        Fields::new().with("note", &self.note)
    }

    fn construct(args: &mut ConstructorArgs) -> Result<Self> {
        Ok(Self {
            note: args.take("note")?,
        })
    }
}
