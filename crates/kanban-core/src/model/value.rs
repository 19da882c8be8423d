//! Ticket field values.
//!
//! The server sends plain JSON: strings for text and enumerated fields,
//! milliseconds since the Unix epoch for timestamps, and arbitrary JSON for
//! the rest (the `changelog` of detailed tickets, nulls, flags).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single ticket field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Other(serde_json::Value),
}

impl FieldValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self::Timestamp(Utc::now().timestamp_millis())
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Other(serde_json::Value::String(s)) => f.write_str(s),
            Self::Timestamp(ms) => match DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", readable_date(&dt)),
                None => write!(f, "{ms}"),
            },
            Self::Other(serde_json::Value::Null) => Ok(()),
            Self::Other(v) => write!(f, "{v}"),
        }
    }
}

/// Human readable timestamp, e.g. `Mon Jan 01 2024 – 09:05`.
#[must_use]
pub fn readable_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a %b %d %Y \u{2013} %H:%M").to_string()
}

/// One entry of a detailed ticket's change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEntry {
    /// Milliseconds since the Unix epoch.
    pub time: i64,
    pub author: String,
    pub field: String,
    #[serde(default)]
    pub old_value: String,
    #[serde(default)]
    pub new_value: String,
    #[serde(default, deserialize_with = "flag")]
    pub permanent: bool,
}

// The server encodes this flag as 0/1.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}
