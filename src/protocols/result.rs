//! Decoded values and per-command results.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::protocols::reading_definition::ReadingDefinition;

/// A typed decoded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

/// The raw slice handed to a reading definition for translation.
///
/// Text protocols produce byte slices; binary layouts produce already
/// typed integers and floats.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
}

impl RawValue {
    pub fn display(&self) -> String {
        match self {
            RawValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            RawValue::Int(i) => i.to_string(),
            RawValue::Float(f) => f.to_string(),
        }
    }
}

impl From<&[u8]> for RawValue {
    fn from(bytes: &[u8]) -> Self {
        RawValue::Bytes(bytes.to_vec())
    }
}

/// One decoded reading: the raw slice it came from, the processed value,
/// and the definition that produced it (carrying unit, icon and home
/// automation metadata for the formatters).
#[derive(Debug, Clone)]
pub struct Reading {
    raw_value: RawValue,
    processed_value: Value,
    definition: Arc<ReadingDefinition>,
}

impl Reading {
    pub fn new(raw_value: RawValue, processed_value: Value, definition: Arc<ReadingDefinition>) -> Self {
        Self {
            raw_value,
            processed_value,
            definition,
        }
    }

    pub fn raw_value(&self) -> &RawValue {
        &self.raw_value
    }

    pub fn processed_value(&self) -> &Value {
        &self.processed_value
    }

    pub fn definition(&self) -> &ReadingDefinition {
        &self.definition
    }

    pub fn description(&self) -> &str {
        self.definition.description()
    }

    pub fn unit(&self) -> &str {
        self.definition.unit()
    }
}

/// The outcome of executing one command: either an ordered list of
/// readings or an error state. Immutable after construction; the raw
/// response bytes are retained either way for diagnostics.
#[derive(Debug, Clone)]
pub struct CommandResult {
    raw_response: Bytes,
    readings: Vec<Reading>,
    error_messages: Vec<String>,
}

impl CommandResult {
    pub fn success(raw_response: impl Into<Bytes>, readings: Vec<Reading>) -> Self {
        Self {
            raw_response: raw_response.into(),
            readings,
            error_messages: Vec::new(),
        }
    }

    pub fn failure(raw_response: impl Into<Bytes>, message: String) -> Self {
        Self {
            raw_response: raw_response.into(),
            readings: Vec::new(),
            error_messages: vec![message],
        }
    }

    pub fn raw_response(&self) -> &[u8] {
        &self.raw_response
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn is_error(&self) -> bool {
        !self.error_messages.is_empty()
    }

    pub fn error_messages(&self) -> &[String] {
        &self.error_messages
    }
}
