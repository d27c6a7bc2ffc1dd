//! Document model as stored by the tablet cloud
//!
//! Field names follow the device's `.content` / `.metadata` JSON.

mod content;
mod document;
mod metadata;

pub use content::{CPages, CPagesUuid, Content, FileType, Orientation, Page, Tag, Zoom, ZoomMode};
pub use document::{Document, SharedDocument};
pub use metadata::{DocumentType, Metadata};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A value stamped with the CRDT timestamp of its last write
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestampedValue<T> {
    #[serde(default)]
    pub timestamp: String,
    pub value: T,
}

impl<T> TimestampedValue<T> {
    pub fn new(timestamp: impl Into<String>, value: T) -> Self {
        Self {
            timestamp: timestamp.into(),
            value,
        }
    }
}

/// Milliseconds since the Unix epoch
pub fn now_time() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The cloud writes epoch millis as strings but older files use numbers
pub(crate) mod millis {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(value),
            Raw::Str(value) if value.is_empty() => Ok(0),
            Raw::Str(value) => value.parse().map_err(serde::de::Error::custom),
        }
    }

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Stamp {
        #[serde(with = "millis")]
        at: i64,
    }

    #[test]
    fn millis_accepts_strings_and_numbers() {
        let a: Stamp = serde_json::from_str(r#"{"at":"1700000000000"}"#).unwrap();
        let b: Stamp = serde_json::from_str(r#"{"at":1700000000000}"#).unwrap();
        let c: Stamp = serde_json::from_str(r#"{"at":""}"#).unwrap();
        assert_eq!(a.at, 1_700_000_000_000);
        assert_eq!(b.at, a.at);
        assert_eq!(c.at, 0);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            r#"{"at":"1700000000000"}"#
        );
    }
}
