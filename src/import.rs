//! Import batches
//!
//! Documents queued for import are uploaded either as-is on a background
//! thread, or in light form: only the PDFs, each carrying a smaller
//! replacement PDF.

use std::sync::{Arc, PoisonError};

use anyhow::Result;
use log::info;

use crate::model::{Document, FileType, SharedDocument};
use crate::registry::DocumentRegistry;
use crate::viewer::UploadTracker;

#[derive(Default)]
pub struct ImportBatch {
    documents: Vec<SharedDocument>,
}

impl ImportBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, document: Document) {
        self.queue(document.into_shared());
    }

    pub fn queue(&mut self, document: SharedDocument) {
        self.documents.push(document);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Upload every queued document on a background thread
    pub fn full_import(self, registry: Arc<dyn DocumentRegistry>, uploads: &UploadTracker) {
        info!("Full import of {} documents", self.documents.len());
        uploads.spawn_batch(registry, self.documents);
    }

    /// Upload only the PDFs, each with its PDF swapped for `light_pdf`
    ///
    /// Runs on the calling thread; returns how many documents were uploaded.
    pub fn light_import(self, registry: &dyn DocumentRegistry, light_pdf: &[u8]) -> Result<usize> {
        let light = self.convert_light(light_pdf);
        info!(
            "Light import of {} of {} documents",
            light.len(),
            self.documents.len()
        );
        registry.upload_many(&light)?;
        Ok(light.len())
    }

    fn convert_light(&self, light_pdf: &[u8]) -> Vec<SharedDocument> {
        self.documents
            .iter()
            .filter_map(|document| {
                let document = document.read().unwrap_or_else(PoisonError::into_inner);
                (document.content.file_type == FileType::Pdf)
                    .then(|| document.replace_pdf(light_pdf).into_shared())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Content, Metadata};
    use crate::test_utils::MemoryRegistry;

    fn batch() -> ImportBatch {
        let mut batch = ImportBatch::new();
        let mut pdf = Document::new("pdf", Metadata::new("Paper"), Content::pdf(3));
        pdf.insert_file("pdf.pdf", b"%PDF-full".to_vec());
        batch.add(pdf);
        batch.add(Document::new(
            "notes",
            Metadata::new("Notes"),
            Content::notebook(["a", "b"]),
        ));
        batch
    }

    #[test]
    fn light_import_uploads_only_pdfs_with_light_blob() {
        let registry = MemoryRegistry::new();
        let uploaded = batch().light_import(&registry, b"%PDF-light").unwrap();

        assert_eq!(uploaded, 1);
        assert_eq!(registry.uploaded_uuids(), vec!["pdf".to_string()]);
        let stored = registry.last_upload("pdf").unwrap();
        assert_eq!(stored.pdf_raw(), Some(&b"%PDF-light"[..]));
    }

    #[test]
    fn full_import_uploads_everything_in_background() {
        let registry = Arc::new(MemoryRegistry::new());
        let uploads = UploadTracker::new();
        let batch = batch();
        assert_eq!(batch.len(), 2);

        batch.full_import(registry.clone(), &uploads);
        uploads.wait_all();

        let mut uuids = registry.uploaded_uuids();
        uuids.sort();
        assert_eq!(uuids, vec!["notes".to_string(), "pdf".to_string()]);
        let stored = registry.last_upload("pdf").unwrap();
        assert_eq!(stored.pdf_raw(), Some(&b"%PDF-full"[..]));
    }
}
