//! Parameter values and binding rules.
//!
//! Callers hand the executor plain positional values (named `p0, p1, …` in
//! the SQL) or an explicit ordered list of named pairs; there is no
//! reflection-driven binding in the core. Values are normalized through
//! [`format_parameter_value`] before they reach a driver: DateTime values
//! are clamped to the configured bounds and strings run through the optional
//! formatter.

use crate::config::DataConfig;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Date/time value without timezone
    DateTime(NaiveDateTime),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// Structured value, bound as the backend's JSON type or as text
    Json(JsonValue),
}

impl ParamValue {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<NaiveDateTime> for ParamValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// A parameter as handed to a driver: marker-less name plus value.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    /// Name without the dialect marker, e.g. `p0`.
    pub name: String,
    pub value: ParamValue,
}

impl BoundParam {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Name used for the positional parameter at `index`.
pub fn positional_name(index: usize) -> String {
    format!("p{index}")
}

/// Normalize a parameter value before binding.
///
/// DateTime values are clamped to the configured min/max bounds (backends
/// disagree on representable ranges), strings run through the optional
/// formatter, and booleans become 0/1 when the configuration asks for
/// binary booleans.
pub fn format_parameter_value(value: ParamValue, config: &DataConfig) -> ParamValue {
    match value {
        ParamValue::DateTime(dt) => {
            if dt < config.min_date_time {
                ParamValue::DateTime(config.min_date_time)
            } else if dt > config.max_date_time {
                ParamValue::DateTime(config.max_date_time)
            } else {
                ParamValue::DateTime(dt)
            }
        }
        ParamValue::String(s) => match &config.string_parameter_formatter {
            Some(formatter) => ParamValue::String(formatter(&s)),
            None => ParamValue::String(s),
        },
        ParamValue::Bool(b) if config.query_boolean_as_binary => {
            ParamValue::Int(if b { 1 } else { 0 })
        }
        other => other,
    }
}

/// Build the positional `p0…pN` bound-parameter list for an execution.
pub fn bind_positional(values: Vec<ParamValue>, config: &DataConfig) -> Vec<BoundParam> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| BoundParam::new(positional_name(i), format_parameter_value(value, config)))
        .collect()
}

/// Build the bound-parameter list for an explicit named list.
pub fn bind_named(values: &[(&str, ParamValue)], config: &DataConfig) -> Vec<BoundParam> {
    values
        .iter()
        .map(|(name, value)| {
            BoundParam::new(*name, format_parameter_value(value.clone(), config))
        })
        .collect()
}
