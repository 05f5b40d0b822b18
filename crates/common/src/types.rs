//! Core types shared by the page objects

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Value held by a single form field.
///
/// Text inputs and selects carry text, switches and checkboxes carry a bool.
/// Numbers deserialize as text, so `port: 25` reads like `port: "25"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(_) => None,
        }
    }

    /// Convert a JSON scalar into a field value
    pub fn from_json(field: &str, value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            serde_json::Value::String(s) => Ok(FieldValue::Text(s.clone())),
            serde_json::Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
            _ => Err(Error::FieldType {
                field: field.to_string(),
                expected: "text or bool",
            }),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        FieldValue::from_json("value", &value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Field name to value, ordered for stable logs and comparisons
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Identity of the appliance server whose settings are driven
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub name: String,
    pub sid: u32,
    pub zone: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: "EVM".to_string(),
            sid: 1,
            zone: "default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_untagged_serde() {
        let v: FieldValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, FieldValue::Bool(true));
        let v: FieldValue = serde_json::from_str("\"pool.ntp.org\"").unwrap();
        assert_eq!(v.as_text(), Some("pool.ntp.org"));
    }

    #[test]
    fn test_from_json_numbers_become_text() {
        let v = FieldValue::from_json("port", &serde_json::json!(389)).unwrap();
        assert_eq!(v, FieldValue::Text("389".into()));
        assert!(FieldValue::from_json("host", &serde_json::json!(["a"])).is_err());
    }
}
