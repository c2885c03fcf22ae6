//! Attribute converters: leaf codecs between native values and attribute values.

mod compression;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;

use crate::document::{to_attribute_value, to_document};
use crate::error::{MappingError, Result};
use crate::schema::FieldType;
use crate::value::Value;

pub use compression::CompressionConverter;

/// The store value kind an attribute is written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    S,
    N,
    B,
    Bool,
    Null,
    L,
    M,
    Ss,
    Ns,
    Bs,
}

impl AttributeKind {
    /// Kind of an attribute value, `None` for values the SDK does not know.
    pub fn of(value: &AttributeValue) -> Option<Self> {
        Some(match value {
            AttributeValue::S(_) => Self::S,
            AttributeValue::N(_) => Self::N,
            AttributeValue::B(_) => Self::B,
            AttributeValue::Bool(_) => Self::Bool,
            AttributeValue::Null(_) => Self::Null,
            AttributeValue::L(_) => Self::L,
            AttributeValue::M(_) => Self::M,
            AttributeValue::Ss(_) => Self::Ss,
            AttributeValue::Ns(_) => Self::Ns,
            AttributeValue::Bs(_) => Self::Bs,
            _ => return None,
        })
    }

    /// Scalar kinds allowed for key attributes and set elements.
    pub fn is_key_kind(self) -> bool {
        matches!(self, Self::S | Self::N | Self::B)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S => "S",
            Self::N => "N",
            Self::B => "B",
            Self::Bool => "BOOL",
            Self::Null => "NULL",
            Self::L => "L",
            Self::M => "M",
            Self::Ss => "SS",
            Self::Ns => "NS",
            Self::Bs => "BS",
        };
        f.write_str(name)
    }
}

/// A pluggable codec for one native type.
///
/// Converters never see `Value::Null`: absent values are handled by the schema before a converter
/// is consulted.
pub trait AttributeConverter: fmt::Debug + Send + Sync {
    fn encode(&self, value: &Value) -> Result<AttributeValue>;
    fn decode(&self, attribute: &AttributeValue) -> Result<Value>;
    /// The declared field type this converter handles.
    fn native_type(&self) -> FieldType;
    /// The attribute kind this converter produces.
    fn attribute_kind(&self) -> AttributeKind;
}

fn unexpected(expected: AttributeKind, attribute: &AttributeValue) -> MappingError {
    MappingError::format(format!(
        "expected {expected} attribute, got {:?}",
        AttributeKind::of(attribute)
    ))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StringConverter;

impl AttributeConverter for StringConverter {
    fn encode(&self, value: &Value) -> Result<AttributeValue> {
        match value {
            Value::String(s) => Ok(AttributeValue::S(s.clone())),
            other => Err(other.mismatch("string")),
        }
    }

    fn decode(&self, attribute: &AttributeValue) -> Result<Value> {
        match attribute {
            AttributeValue::S(s) => Ok(Value::String(s.clone())),
            other => Err(unexpected(AttributeKind::S, other)),
        }
    }

    fn native_type(&self) -> FieldType {
        FieldType::String
    }

    fn attribute_kind(&self) -> AttributeKind {
        AttributeKind::S
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BoolConverter;

impl AttributeConverter for BoolConverter {
    fn encode(&self, value: &Value) -> Result<AttributeValue> {
        match value {
            Value::Bool(b) => Ok(AttributeValue::Bool(*b)),
            other => Err(other.mismatch("bool")),
        }
    }

    fn decode(&self, attribute: &AttributeValue) -> Result<Value> {
        match attribute {
            AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(unexpected(AttributeKind::Bool, other)),
        }
    }

    fn native_type(&self) -> FieldType {
        FieldType::Bool
    }

    fn attribute_kind(&self) -> AttributeKind {
        AttributeKind::Bool
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntConverter;

impl AttributeConverter for IntConverter {
    fn encode(&self, value: &Value) -> Result<AttributeValue> {
        match value {
            Value::Int(n) => Ok(AttributeValue::N(n.to_string())),
            other => Err(other.mismatch("int")),
        }
    }

    fn decode(&self, attribute: &AttributeValue) -> Result<Value> {
        match attribute {
            AttributeValue::N(literal) => literal
                .parse()
                .map(Value::Int)
                .map_err(|_| MappingError::format(format!("invalid integer: {literal}"))),
            other => Err(unexpected(AttributeKind::N, other)),
        }
    }

    fn native_type(&self) -> FieldType {
        FieldType::Int
    }

    fn attribute_kind(&self) -> AttributeKind {
        AttributeKind::N
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FloatConverter;

impl AttributeConverter for FloatConverter {
    fn encode(&self, value: &Value) -> Result<AttributeValue> {
        match value {
            Value::Float(f) if f.is_finite() => Ok(AttributeValue::N(f.to_string())),
            Value::Float(f) => Err(MappingError::format(format!(
                "non-finite number cannot be stored: {f}"
            ))),
            Value::Int(n) => Ok(AttributeValue::N(n.to_string())),
            other => Err(other.mismatch("float")),
        }
    }

    fn decode(&self, attribute: &AttributeValue) -> Result<Value> {
        match attribute {
            AttributeValue::N(literal) => match literal.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::Float(f)),
                _ => Err(MappingError::format(format!("invalid number: {literal}"))),
            },
            other => Err(unexpected(AttributeKind::N, other)),
        }
    }

    fn native_type(&self) -> FieldType {
        FieldType::Float
    }

    fn attribute_kind(&self) -> AttributeKind {
        AttributeKind::N
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BytesConverter;

impl AttributeConverter for BytesConverter {
    fn encode(&self, value: &Value) -> Result<AttributeValue> {
        match value {
            Value::Bytes(bytes) => Ok(AttributeValue::B(Blob::new(bytes.clone()))),
            other => Err(other.mismatch("bytes")),
        }
    }

    fn decode(&self, attribute: &AttributeValue) -> Result<Value> {
        match attribute {
            AttributeValue::B(blob) => Ok(Value::Bytes(blob.as_ref().to_vec())),
            other => Err(unexpected(AttributeKind::B, other)),
        }
    }

    fn native_type(&self) -> FieldType {
        FieldType::Bytes
    }

    fn attribute_kind(&self) -> AttributeKind {
        AttributeKind::B
    }
}

/// Stores an opaque JSON document as a nested attribute value.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentConverter;

impl AttributeConverter for DocumentConverter {
    fn encode(&self, value: &Value) -> Result<AttributeValue> {
        match value {
            Value::Document(document) => Ok(to_attribute_value(document)),
            other => Err(other.mismatch("document")),
        }
    }

    fn decode(&self, attribute: &AttributeValue) -> Result<Value> {
        to_document(attribute).map(Value::Document)
    }

    fn native_type(&self) -> FieldType {
        FieldType::Document
    }

    fn attribute_kind(&self) -> AttributeKind {
        AttributeKind::M
    }
}

/// Resolves converters by declared field type.
///
/// Built-in converters cover the scalar types. A registered converter takes precedence over the
/// built-in one for its native type; registering two for the same type makes resolution
/// ambiguous, which fails schema compilation.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    defaults: Vec<Arc<dyn AttributeConverter>>,
    custom: Vec<Arc<dyn AttributeConverter>>,
    identity: u64,
}

/// Identity of the built-in registry. Every registration produces a fresh one.
const DEFAULT_IDENTITY: u64 = 0;

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(DEFAULT_IDENTITY + 1);

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self {
            defaults: vec![
                Arc::new(StringConverter),
                Arc::new(BoolConverter),
                Arc::new(IntConverter),
                Arc::new(FloatConverter),
                Arc::new(BytesConverter),
                Arc::new(DocumentConverter),
            ],
            custom: Vec::new(),
            identity: DEFAULT_IDENTITY,
        }
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter for its native type.
    pub fn with(mut self, converter: Arc<dyn AttributeConverter>) -> Self {
        self.custom.push(converter);
        self.identity = NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed);
        self
    }

    /// Distinguishes registries that may resolve a type differently. Clones share it.
    pub(crate) fn identity(&self) -> u64 {
        self.identity
    }

    /// Finds the converter for a declared type, `None` when no converter handles it.
    pub(crate) fn resolve(
        &self,
        record: &'static str,
        field: &str,
        field_type: &FieldType,
    ) -> Result<Option<Arc<dyn AttributeConverter>>> {
        let mut custom = self
            .custom
            .iter()
            .filter(|c| c.native_type() == *field_type);

        match (custom.next(), custom.next()) {
            (Some(_), Some(_)) => Err(MappingError::config(
                record,
                format!("ambiguous converter resolution for field `{field}` of type {field_type}"),
            )),
            (Some(converter), None) => Ok(Some(Arc::clone(converter))),
            (None, _) => Ok(self
                .defaults
                .iter()
                .find(|c| c.native_type() == *field_type)
                .cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_converter_round_trip() {
        let encoded = IntConverter.encode(&Value::Int(-7)).unwrap();

        assert_eq!(encoded, AttributeValue::N("-7".to_string()));
        assert_eq!(IntConverter.decode(&encoded).unwrap(), Value::Int(-7));
    }

    #[test]
    fn test_int_converter_rejects_fraction() {
        let result = IntConverter.decode(&AttributeValue::N("1.5".to_string()));

        assert!(matches!(result, Err(MappingError::ValueFormat(_))));
    }

    #[test]
    fn test_float_converter_rejects_nan() {
        assert!(FloatConverter.encode(&Value::Float(f64::NAN)).is_err());
        assert_eq!(
            FloatConverter.encode(&Value::Float(2.5)).unwrap(),
            AttributeValue::N("2.5".to_string())
        );
    }

    #[test]
    fn test_wrong_attribute_kind_is_value_format_error() {
        let result = StringConverter.decode(&AttributeValue::Bool(true));

        assert!(matches!(result, Err(MappingError::ValueFormat(_))));
    }

    #[test]
    fn test_document_converter_uses_bridge() {
        let encoded = DocumentConverter
            .encode(&Value::Document(json!({"a": [1, "b"]})))
            .unwrap();

        assert!(encoded.is_m());
        assert_eq!(
            DocumentConverter.decode(&encoded).unwrap(),
            Value::Document(json!({"a": [1, "b"]}))
        );
    }

    #[test]
    fn test_registry_resolves_defaults() {
        let registry = ConverterRegistry::default();

        let converter = registry
            .resolve("Test", "name", &FieldType::String)
            .unwrap()
            .unwrap();

        assert_eq!(converter.attribute_kind(), AttributeKind::S);
        assert!(registry
            .resolve("Test", "items", &FieldType::List(Box::new(FieldType::Int)))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_registry_prefers_custom_converter() {
        let registry = ConverterRegistry::new().with(Arc::new(CompressionConverter::default()));

        let converter = registry
            .resolve("Test", "payload", &FieldType::Bytes)
            .unwrap()
            .unwrap();

        let encoded = converter.encode(&Value::bytes(vec![0u8; 64])).unwrap();
        assert!(encoded.as_b().unwrap().as_ref().len() < 64);
    }

    #[test]
    fn test_registry_identity() {
        let default = ConverterRegistry::default();
        let custom = ConverterRegistry::new().with(Arc::new(CompressionConverter::default()));

        assert_eq!(default.identity(), ConverterRegistry::new().identity());
        assert_eq!(custom.identity(), custom.clone().identity());
        assert_ne!(custom.identity(), default.identity());
        assert_ne!(
            custom.identity(),
            ConverterRegistry::new()
                .with(Arc::new(CompressionConverter::default()))
                .identity()
        );
    }

    #[test]
    fn test_registry_ambiguous_resolution() {
        let registry = ConverterRegistry::new()
            .with(Arc::new(CompressionConverter::default()))
            .with(Arc::new(BytesConverter));

        let result = registry.resolve("Test", "payload", &FieldType::Bytes);

        assert!(matches!(
            result,
            Err(MappingError::SchemaConfiguration { record: "Test", .. })
        ));
    }
}
