use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;

use super::{AttributeConverter, AttributeKind};
use crate::error::{MappingError, Result};
use crate::schema::FieldType;
use crate::value::Value;

const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Stores a binary payload zstd-compressed.
#[derive(Debug, Clone, Copy)]
pub struct CompressionConverter {
    compression_level: i32,
}

impl Default for CompressionConverter {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl CompressionConverter {
    pub fn new(compression_level: i32) -> Self {
        Self { compression_level }
    }
}

impl AttributeConverter for CompressionConverter {
    fn encode(&self, value: &Value) -> Result<AttributeValue> {
        let Value::Bytes(bytes) = value else {
            return Err(value.mismatch("bytes"));
        };
        let compressed = zstd::encode_all(bytes.as_slice(), self.compression_level)
            .map_err(|e| MappingError::format(format!("zstd encoder: {e}")))?;
        Ok(AttributeValue::B(Blob::new(compressed)))
    }

    fn decode(&self, attribute: &AttributeValue) -> Result<Value> {
        let AttributeValue::B(blob) = attribute else {
            return Err(MappingError::format(format!(
                "expected compressed B attribute, got {:?}",
                AttributeKind::of(attribute)
            )));
        };
        zstd::decode_all(blob.as_ref())
            .map(Value::Bytes)
            .map_err(|e| MappingError::format(format!("zstd decoder: {e}")))
    }

    fn native_type(&self) -> FieldType {
        FieldType::Bytes
    }

    fn attribute_kind(&self) -> AttributeKind {
        AttributeKind::B
    }
}
