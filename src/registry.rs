//! Document registry and sync boundary
//!
//! The viewer consumes documents through [`DocumentRegistry`]. The sync
//! protocol behind `upload` is not this crate's concern; [`LocalLibrary`]
//! keeps a directory mirror of the cloud and treats writing it back as the
//! upload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::model::{Content, Document, Metadata, SharedDocument};

pub trait DocumentRegistry: Send + Sync {
    fn get(&self, uuid: &str) -> Option<SharedDocument>;

    /// Verify the document's files, downloading or flagging what is missing
    fn check_integrity(&self, document: &SharedDocument) -> Result<()>;

    /// Push the document to the sync service, optionally dropping its blobs after
    fn upload(&self, document: &SharedDocument, unload: bool) -> Result<()>;

    fn upload_many(&self, documents: &[SharedDocument]) -> Result<()> {
        for document in documents {
            self.upload(document, false)?;
        }
        Ok(())
    }
}

/// Directory of `<uuid>.metadata`, `<uuid>.content` and `<uuid>.pdf` files
pub struct LocalLibrary {
    root: PathBuf,
    documents: Mutex<HashMap<String, SharedDocument>>,
}

impl LocalLibrary {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create library directory {root:?}"))?;
        info!("Opened library at {root:?}");
        Ok(Self {
            root,
            documents: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// UUIDs of every document with a metadata file
    pub fn list(&self) -> Result<Vec<String>> {
        let mut uuids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("metadata") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    uuids.push(stem.to_string());
                }
            }
        }
        uuids.sort();
        Ok(uuids)
    }

    fn path_for(&self, uuid: &str, extension: &str) -> PathBuf {
        self.root.join(format!("{uuid}.{extension}"))
    }

    fn load(&self, uuid: &str) -> Result<Document> {
        let metadata_bytes = fs::read(self.path_for(uuid, "metadata"))
            .with_context(|| format!("Missing metadata for {uuid}"))?;
        let metadata: Metadata = serde_json::from_slice(&metadata_bytes)
            .with_context(|| format!("Invalid metadata for {uuid}"))?;

        let content = match fs::read(self.path_for(uuid, "content")) {
            Ok(bytes) => Content::parse(&bytes),
            Err(e) => {
                warn!("No content file for {uuid}: {e}");
                Content::unusable()
            }
        };

        let mut document = Document::new(uuid, metadata, content);
        self.load_files(&mut document)?;
        Ok(document)
    }

    fn load_files(&self, document: &mut Document) -> Result<()> {
        let pdf_path = self.path_for(&document.uuid, "pdf");
        if pdf_path.exists() {
            let bytes = fs::read(&pdf_path)?;
            document.insert_file(document.pdf_file_name(), bytes);
        }

        let page_dir = self.root.join(&document.uuid);
        if page_dir.is_dir() {
            for entry in fs::read_dir(&page_dir)? {
                let path = entry?.path();
                let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                    continue;
                };
                let key = format!("{}/{name}", document.uuid);
                document.insert_file(key, fs::read(&path)?);
            }
        }
        Ok(())
    }

    /// Add or replace a document on disk
    pub fn store(&self, document: &Document) -> Result<()> {
        fs::write(
            self.path_for(&document.uuid, "metadata"),
            serde_json::to_vec_pretty(&document.metadata)?,
        )?;
        fs::write(
            self.path_for(&document.uuid, "content"),
            document.content.to_json()?,
        )?;

        let prefix = format!("{}/", document.uuid);
        for (name, data) in &document.files {
            if *name == document.pdf_file_name() {
                fs::write(self.path_for(&document.uuid, "pdf"), data)?;
            } else if let Some(relative) = name.strip_prefix(&prefix) {
                let page_dir = self.root.join(&document.uuid);
                fs::create_dir_all(&page_dir)?;
                fs::write(page_dir.join(relative), data)?;
            }
        }
        Ok(())
    }
}

impl DocumentRegistry for LocalLibrary {
    fn get(&self, uuid: &str) -> Option<SharedDocument> {
        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(document) = documents.get(uuid) {
            return Some(Arc::clone(document));
        }
        match self.load(uuid) {
            Ok(document) => {
                let shared = Arc::new(RwLock::new(document));
                documents.insert(uuid.to_string(), Arc::clone(&shared));
                Some(shared)
            }
            Err(e) => {
                debug!("Document {uuid} unavailable: {e:#}");
                None
            }
        }
    }

    fn check_integrity(&self, document: &SharedDocument) -> Result<()> {
        let mut document = document
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !document.is_loaded() {
            debug!("Reloading files for {}", document.uuid);
            self.load_files(&mut document)?;
        }
        if document.content.file_type.is_pdf_backed() && document.pdf_raw().is_none() {
            warn!("Document {} has no PDF blob", document.uuid);
        }
        Ok(())
    }

    fn upload(&self, document: &SharedDocument, unload: bool) -> Result<()> {
        let mut document = document
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.store(&document)
            .with_context(|| format!("Failed to upload {}", document.uuid))?;
        info!("Uploaded {} ({})", document.uuid, document.metadata.visible_name);
        if unload {
            document.unload_files();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileType;

    fn sample_document() -> Document {
        let mut document = Document::new("doc-1", Metadata::new("Sample"), Content::pdf(2));
        document.insert_file("doc-1.pdf", b"%PDF".to_vec());
        document.insert_file("doc-1/page-0.svg", b"<svg/>".to_vec());
        document
    }

    #[test]
    fn stored_documents_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let library = LocalLibrary::open(dir.path()).unwrap();
        library.store(&sample_document()).unwrap();

        assert_eq!(library.list().unwrap(), vec!["doc-1".to_string()]);

        let shared = library.get("doc-1").unwrap();
        let document = shared.read().unwrap();
        assert_eq!(document.metadata.visible_name, "Sample");
        assert_eq!(document.content.file_type, FileType::Pdf);
        assert_eq!(document.content.c_pages.len(), 2);
        assert_eq!(document.pdf_raw(), Some(&b"%PDF"[..]));
        assert_eq!(
            document.files.get("doc-1/page-0.svg").map(Vec::as_slice),
            Some(&b"<svg/>"[..])
        );
    }

    #[test]
    fn get_returns_the_same_handle() {
        let dir = tempfile::tempdir().unwrap();
        let library = LocalLibrary::open(dir.path()).unwrap();
        library.store(&sample_document()).unwrap();

        let a = library.get("doc-1").unwrap();
        let b = library.get("doc-1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(library.get("missing").is_none());
    }

    #[test]
    fn missing_content_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let library = LocalLibrary::open(dir.path()).unwrap();
        library.store(&sample_document()).unwrap();
        fs::remove_file(dir.path().join("doc-1.content")).unwrap();

        let shared = library.get("doc-1").unwrap();
        assert!(!shared.read().unwrap().content.usable);
    }

    #[test]
    fn upload_writes_back_and_unloads() {
        let dir = tempfile::tempdir().unwrap();
        let library = LocalLibrary::open(dir.path()).unwrap();
        library.store(&sample_document()).unwrap();

        let shared = library.get("doc-1").unwrap();
        shared.write().unwrap().metadata.last_opened_page = 1;
        library.upload(&shared, true).unwrap();
        assert!(!shared.read().unwrap().is_loaded());

        let bytes = fs::read(dir.path().join("doc-1.metadata")).unwrap();
        let metadata: Metadata = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(metadata.last_opened_page, 1);

        library.check_integrity(&shared).unwrap();
        assert!(shared.read().unwrap().is_loaded());
    }
}
