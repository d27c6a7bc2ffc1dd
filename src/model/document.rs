use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Content, Metadata};

/// Registry handle to a document; the viewer session is its only writer
pub type SharedDocument = Arc<RwLock<Document>>;

#[derive(Clone, Debug)]
pub struct Document {
    pub uuid: String,
    pub metadata: Metadata,
    pub content: Content,
    /// Downloaded file blobs keyed by file name
    pub files: HashMap<String, Vec<u8>>,
    /// File names the cloud has for this document
    pub files_available: Vec<String>,
}

impl Document {
    pub fn new(uuid: impl Into<String>, metadata: Metadata, content: Content) -> Self {
        Self {
            uuid: uuid.into(),
            metadata,
            content,
            files: HashMap::new(),
            files_available: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }

    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.uuid)
    }

    /// Name of the ink SVG blob for a page
    pub fn page_svg_name(&self, page_id: &str) -> String {
        format!("{}/{page_id}.svg", self.uuid)
    }

    pub fn pdf_raw(&self) -> Option<&[u8]> {
        self.files.get(&self.pdf_file_name()).map(Vec::as_slice)
    }

    pub fn insert_file(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        if !self.files_available.contains(&name) {
            self.files_available.push(name.clone());
        }
        self.files.insert(name, data);
    }

    /// Replace the embedded PDF, keeping the page structure
    pub fn replace_pdf(&self, pdf: &[u8]) -> Document {
        let mut copy = self.clone();
        copy.insert_file(self.pdf_file_name(), pdf.to_vec());
        copy.content.size_in_bytes = pdf.len() as i64;
        copy
    }

    /// Drop locally cached blobs; they can be fetched again on demand
    pub fn unload_files(&mut self) {
        self.files.clear();
    }

    pub fn is_loaded(&self) -> bool {
        !self.files.is_empty()
    }
}
