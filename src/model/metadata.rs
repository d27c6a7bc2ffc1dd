use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    #[default]
    DocumentType,
    CollectionType,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub visible_name: String,
    #[serde(rename = "type", default)]
    pub doc_type: DocumentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, with = "super::millis")]
    pub created_time: i64,
    #[serde(default, with = "super::millis")]
    pub last_modified: i64,
    #[serde(default, with = "super::millis")]
    pub last_opened: i64,
    #[serde(default)]
    pub last_opened_page: usize,
    #[serde(rename = "metadatamodified", default)]
    pub metadata_modified: bool,
    #[serde(default)]
    pub modified: bool,
    #[serde(default)]
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl Metadata {
    pub fn new(visible_name: impl Into<String>) -> Self {
        let now = super::now_time();
        Self {
            visible_name: visible_name.into(),
            doc_type: DocumentType::DocumentType,
            parent: None,
            created_time: now,
            last_modified: now,
            last_opened: 0,
            last_opened_page: 0,
            metadata_modified: false,
            modified: false,
            synced: false,
            version: None,
        }
    }
}
