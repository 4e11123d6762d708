//! Merging a handler's result value into the invocation record.
//!
//! Handlers describe their result through [`ReadableFields`], an explicit
//! name/value mapping. [`Serialized`] derives that mapping from any
//! `serde::Serialize` struct or map for handlers that already have one.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::attributes::AttributeValue;
use crate::error::IntrospectionError;

/// A value whose readable fields can be copied into the attribute record.
pub trait ReadableFields {
    /// Enumerates the (name, value) pairs to merge. On error nothing is merged.
    fn readable_fields(&self) -> Result<Vec<(String, AttributeValue)>, IntrospectionError>;
}

/// Default handler result carrying a single return value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    value: Option<String>,
}

impl Response {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }
}

impl ReadableFields for Response {
    fn readable_fields(&self) -> Result<Vec<(String, AttributeValue)>, IntrospectionError> {
        Ok(vec![("value".to_string(), self.value.clone().into())])
    }
}

impl ReadableFields for HashMap<String, AttributeValue> {
    fn readable_fields(&self) -> Result<Vec<(String, AttributeValue)>, IntrospectionError> {
        Ok(self.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl ReadableFields for BTreeMap<String, AttributeValue> {
    fn readable_fields(&self) -> Result<Vec<(String, AttributeValue)>, IntrospectionError> {
        Ok(self.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

/// Reads the fields of any serializable struct or map.
///
/// Top-level fields become attributes; nested arrays and objects are kept as
/// their JSON text. Values that serialize to anything other than an object
/// cannot be introspected.
#[derive(Debug, Clone)]
pub struct Serialized<T>(pub T);

impl<T: Serialize> ReadableFields for Serialized<T> {
    fn readable_fields(&self) -> Result<Vec<(String, AttributeValue)>, IntrospectionError> {
        match serde_json::to_value(&self.0)? {
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(name, value)| (name, json_to_attribute(value)))
                .collect()),
            other => Err(IntrospectionError::NotAnObject(json_kind(&other))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn json_to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Absent,
        Value::Bool(b) => b.into(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => AttributeValue::Int(i),
            (None, Some(u), _) => u.into(),
            (None, None, Some(f)) => AttributeValue::Float(f),
            _ => AttributeValue::Str(n.to_string()),
        },
        Value::String(s) => AttributeValue::Str(s),
        nested @ (Value::Array(_) | Value::Object(_)) => AttributeValue::Str(nested.to_string()),
    }
}
