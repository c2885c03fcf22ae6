//! Lossless conversion between JSON documents and DynamoDB attribute values.
//!
//! The bridge covers the JSON value space only: objects, arrays, strings, numbers, booleans and
//! null. Binary values, sets and the SDK's `Unknown` variant are rejected on the way back.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value as Json};

use crate::error::{MappingError, Result};
use crate::Item;

/// A numeric literal classified by its textual form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberLiteral {
    /// Integral and within 32-bit range.
    Int(i32),
    /// Integral and within signed 64-bit range.
    Long(i64),
    /// Integral, above `i64::MAX` but within unsigned 64-bit range.
    UnsignedLong(u64),
    /// Contains a fractional part or an exponent.
    Double(f64),
}

impl NumberLiteral {
    /// Converts the literal to a JSON number.
    pub fn to_json(self) -> Result<Number> {
        match self {
            Self::Int(n) => Ok(Number::from(n)),
            Self::Long(n) => Ok(Number::from(n)),
            Self::UnsignedLong(n) => Ok(Number::from(n)),
            Self::Double(n) => Number::from_f64(n)
                .ok_or_else(|| MappingError::format(format!("non-finite number: {n}"))),
        }
    }
}

/// Classifies a DynamoDB number literal.
///
/// Integral literals outside the 64-bit range are rejected rather than rounded.
pub fn parse_number(literal: &str) -> Result<NumberLiteral> {
    let invalid = || MappingError::format(format!("invalid number: {literal}"));

    if literal.contains(['.', 'e', 'E']) {
        let value: f64 = literal.parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        return Ok(NumberLiteral::Double(value));
    }

    if let Ok(value) = literal.parse::<i64>() {
        return Ok(match i32::try_from(value) {
            Ok(small) => NumberLiteral::Int(small),
            Err(_) => NumberLiteral::Long(value),
        });
    }

    if let Ok(value) = literal.parse::<u64>() {
        return Ok(NumberLiteral::UnsignedLong(value));
    }

    let digits = literal.strip_prefix(['-', '+']).unwrap_or(literal);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MappingError::format(format!(
            "integral number exceeds 64-bit range: {literal}"
        )));
    }

    Err(invalid())
}

/// Converts a JSON document into an attribute value.
pub fn to_attribute_value(document: &Json) -> AttributeValue {
    match document {
        Json::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), to_attribute_value(value)))
                .collect(),
        ),
        Json::Array(values) => AttributeValue::L(values.iter().map(to_attribute_value).collect()),
        Json::Number(number) => AttributeValue::N(number.to_string()),
        Json::Bool(value) => AttributeValue::Bool(*value),
        Json::String(value) => AttributeValue::S(value.clone()),
        Json::Null => AttributeValue::Null(true),
    }
}

/// Converts an attribute value back into a JSON document.
pub fn to_document(attribute: &AttributeValue) -> Result<Json> {
    match attribute {
        AttributeValue::M(fields) => {
            let mut object = Map::with_capacity(fields.len());
            for (name, value) in fields {
                object.insert(name.clone(), to_document(value)?);
            }
            Ok(Json::Object(object))
        }
        AttributeValue::L(values) => values
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>>>()
            .map(Json::Array),
        AttributeValue::S(value) => Ok(Json::String(value.clone())),
        AttributeValue::Bool(value) => Ok(Json::Bool(*value)),
        AttributeValue::N(literal) => parse_number(literal)?.to_json().map(Json::Number),
        AttributeValue::Null(true) => Ok(Json::Null),
        other => Err(MappingError::format(format!(
            "unexpected attribute value type: {other:?}"
        ))),
    }
}

/// Converts a whole item into a JSON object.
pub fn item_to_document(item: &Item) -> Result<Json> {
    let mut object = Map::with_capacity(item.len());
    for (name, value) in item {
        object.insert(name.clone(), to_document(value)?);
    }
    Ok(Json::Object(object))
}

/// Converts a JSON object into an item.
pub fn document_to_item(document: &Json) -> Result<Item> {
    match document {
        Json::Object(fields) => Ok(fields
            .iter()
            .map(|(name, value)| (name.clone(), to_attribute_value(value)))
            .collect::<HashMap<_, _>>()),
        other => Err(MappingError::format(format!(
            "an item must be a JSON object, got: {other}"
        ))),
    }
}
