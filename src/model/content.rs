use log::warn;
use serde::{Deserialize, Serialize};

use super::TimestampedValue;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileType {
    Pdf,
    Epub,
    Notebook,
    Unknown(String),
}

impl FileType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pdf => "pdf",
            Self::Epub => "epub",
            Self::Notebook => "notebook",
            Self::Unknown(other) => other,
        }
    }

    /// Formats backed by an embedded PDF
    pub fn is_pdf_backed(&self) -> bool {
        matches!(self, Self::Pdf | Self::Epub)
    }
}

impl From<String> for FileType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pdf" => Self::Pdf,
            "epub" => Self::Epub,
            // Empty file types are written for fresh notebooks
            "notebook" | "" => Self::Notebook,
            _ => Self::Unknown(value),
        }
    }
}

impl From<FileType> for String {
    fn from(value: FileType) -> Self {
        value.as_str().to_string()
    }
}

impl Default for FileType {
    fn default() -> Self {
        Self::Notebook
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoomMode {
    #[default]
    BestFit,
    CustomFit,
    FitToWidth,
    FitToHeight,
    #[serde(other)]
    Unknown,
}

/// Zoom configuration, stored flat inside the content JSON
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zoom {
    #[serde(default)]
    pub zoom_mode: ZoomMode,
    #[serde(default)]
    pub custom_zoom_center_x: f32,
    #[serde(default)]
    pub custom_zoom_center_y: f32,
    #[serde(default)]
    pub custom_zoom_page_height: f32,
    #[serde(default)]
    pub custom_zoom_page_width: f32,
    #[serde(default = "default_scale")]
    pub custom_zoom_scale: f32,
}

fn default_scale() -> f32 {
    1.0
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            zoom_mode: ZoomMode::default(),
            custom_zoom_center_x: 0.0,
            custom_zoom_center_y: 0.0,
            custom_zoom_page_height: 0.0,
            custom_zoom_page_width: 0.0,
            custom_zoom_scale: default_scale(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(rename = "idx", default)]
    pub index: TimestampedValue<String>,
    #[serde(default)]
    pub template: TimestampedValue<String>,
    /// Page index inside the embedded PDF
    #[serde(rename = "redir", default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<TimestampedValue<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_time: Option<TimestampedValue<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_scroll: Option<TimestampedValue<f64>>,
}

impl Page {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_redirect(mut self, pdf_page: i64) -> Self {
        self.redirect = Some(TimestampedValue::new("1:1", pdf_page));
        self
    }

    /// Embedded PDF page index, when this page mirrors one
    pub fn pdf_page(&self) -> Option<usize> {
        self.redirect
            .as_ref()
            .and_then(|redirect| usize::try_from(redirect.value).ok())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CPagesUuid {
    pub first: String,
    pub second: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CPages {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default = "default_original")]
    pub original: TimestampedValue<i64>,
    #[serde(default)]
    pub last_opened: TimestampedValue<String>,
    #[serde(default)]
    pub uuids: Vec<CPagesUuid>,
}

fn default_original() -> TimestampedValue<i64> {
    TimestampedValue::new("0:0", -1)
}

impl Default for CPages {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            original: default_original(),
            last_opened: TimestampedValue::default(),
            uuids: Vec::new(),
        }
    }
}

impl CPages {
    pub fn index_of(&self, page_id: &str) -> Option<usize> {
        self.pages.iter().position(|page| page.id == page_id)
    }

    pub fn page(&self, page_id: &str) -> Option<&Page> {
        self.pages.iter().find(|page| page.id == page_id)
    }

    /// Index of the page the document was last closed on
    pub fn last_opened_index(&self) -> Option<usize> {
        self.index_of(&self.last_opened.value)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default)]
    pub c_pages: CPages,
    #[serde(default)]
    pub cover_page_number: i32,
    #[serde(default)]
    pub file_type: FileType,
    #[serde(rename = "formatVersion", default)]
    pub version: u32,
    #[serde(flatten)]
    pub zoom: Zoom,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, with = "super::millis")]
    pub size_in_bytes: i64,
    #[serde(default)]
    pub dummy_document: bool,
    /// Cleared when the stored content could not be understood
    #[serde(skip, default = "default_usable")]
    pub usable: bool,
}

fn default_usable() -> bool {
    true
}

impl Content {
    /// Parse `.content` JSON; malformed input yields unusable content
    pub fn parse(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Content>(bytes) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to parse content: {e}");
                Self::unusable()
            }
        }
    }

    pub fn unusable() -> Self {
        Self {
            usable: false,
            ..Self::new(FileType::Unknown(String::new()), Vec::new())
        }
    }

    pub fn new(file_type: FileType, pages: Vec<Page>) -> Self {
        Self {
            c_pages: CPages {
                pages,
                ..CPages::default()
            },
            cover_page_number: 0,
            file_type,
            version: 2,
            zoom: Zoom::default(),
            orientation: Orientation::Portrait,
            tags: Vec::new(),
            size_in_bytes: 0,
            dummy_document: false,
            usable: true,
        }
    }

    /// Notebook with one blank page per id
    pub fn notebook<I, S>(page_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            FileType::Notebook,
            page_ids.into_iter().map(Page::new).collect(),
        )
    }

    /// PDF whose pages redirect one-to-one into the embedded file
    pub fn pdf(page_count: usize) -> Self {
        let pages = (0..page_count)
            .map(|i| Page::new(format!("page-{i}")).with_redirect(i as i64))
            .collect();
        Self::new(FileType::Pdf, pages)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}
