//! Fakes and builders shared by unit and integration tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use image::{Rgba, RgbaImage};

use crate::event_source::{InputEvent, Key, SimulatedEventSource};
use crate::geometry::{Point, Size};
use crate::model::{Content, Document, Metadata, SharedDocument};
use crate::registry::DocumentRegistry;
use crate::renderer::{Backends, BrowserBackend, BrowserSession, InkSource, PdfPages, PdfRasterizer, WorkerFault};

pub const BLANK_INK: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="1404" height="1872"><path d="M 100 100 L 600 900" stroke="black" stroke-width="8"/></svg>"#;

/// In-memory registry recording a snapshot of every upload
#[derive(Default)]
pub struct MemoryRegistry {
    documents: Mutex<HashMap<String, SharedDocument>>,
    uploads: Mutex<Vec<Document>>,
    integrity_checks: AtomicUsize,
    fail_uploads: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let registry = Self::new();
        for document in documents {
            registry.insert(document);
        }
        registry
    }

    pub fn insert(&self, document: Document) -> SharedDocument {
        let uuid = document.uuid.clone();
        let shared = document.into_shared();
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uuid, Arc::clone(&shared));
        shared
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn uploaded_uuids(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|document| document.uuid.clone())
            .collect()
    }

    /// State of the document as it was when last uploaded
    pub fn last_upload(&self, uuid: &str) -> Option<Document> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|document| document.uuid == uuid)
            .cloned()
    }

    pub fn integrity_checks(&self) -> usize {
        self.integrity_checks.load(Ordering::SeqCst)
    }
}

impl DocumentRegistry for MemoryRegistry {
    fn get(&self, uuid: &str) -> Option<SharedDocument> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uuid)
            .cloned()
    }

    fn check_integrity(&self, _document: &SharedDocument) -> Result<()> {
        self.integrity_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn upload(&self, document: &SharedDocument, unload: bool) -> Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            anyhow::bail!("upload rejected");
        }
        let mut document = document.write().unwrap_or_else(PoisonError::into_inner);
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(document.clone());
        if unload {
            document.unload_files();
        }
        Ok(())
    }
}

/// Everything the fake browser was asked to do
#[derive(Debug, Default)]
pub struct BrowserLog {
    pub spawned: Vec<String>,
    pub scripts: Vec<String>,
    pub downs: Vec<u8>,
    pub ups: Vec<u8>,
    pub motions: Vec<Point>,
    pub exits: usize,
    /// Overrides the URL the session reports
    pub url: Option<String>,
}

pub struct FakeBrowserSession {
    log: Arc<Mutex<BrowserLog>>,
    frame: RgbaImage,
    ready: bool,
}

impl BrowserSession for FakeBrowserSession {
    fn current_url(&self) -> Option<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).url.clone()
    }

    fn execute_js(&mut self, code: &str) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .scripts
            .push(code.to_string());
    }

    fn snapshot(&self) -> &RgbaImage {
        &self.frame
    }

    fn ready_signal(&self) -> Option<bool> {
        Some(self.ready)
    }

    fn motion_at(&mut self, pos: Point) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).motions.push(pos);
    }

    fn mouse_down_at(&mut self, _pos: Point, button: u8) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).downs.push(button);
    }

    fn mouse_up_at(&mut self, _pos: Point, button: u8) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).ups.push(button);
    }

    fn exit(&mut self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).exits += 1;
    }
}

/// Browser that is ready immediately, or never starts when `fail` is set
pub struct FakeBrowserBackend {
    log: Arc<Mutex<BrowserLog>>,
    fail: bool,
}

impl FakeBrowserBackend {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(BrowserLog::default())),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn log(&self) -> Arc<Mutex<BrowserLog>> {
        Arc::clone(&self.log)
    }
}

impl Default for FakeBrowserBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserBackend for FakeBrowserBackend {
    fn spawn(&self, url: &str, viewport: Size) -> Result<Box<dyn BrowserSession>> {
        if self.fail {
            anyhow::bail!("browser process did not start");
        }
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.spawned.push(url.to_string());
        log.url = Some(format!("file://{url}"));
        Ok(Box::new(FakeBrowserSession {
            log: Arc::clone(&self.log),
            frame: RgbaImage::from_pixel(viewport.width, viewport.height, Rgba([200, 200, 200, 255])),
            ready: true,
        }))
    }
}

struct FakePages {
    count: usize,
}

impl PdfPages for FakePages {
    fn page_count(&self) -> usize {
        self.count
    }

    fn render_page(&mut self, index: usize, scale: f32) -> Result<RgbaImage, WorkerFault> {
        let width = (30.0 * scale).round() as u32;
        let height = (40.0 * scale).round() as u32;
        Ok(RgbaImage::from_pixel(width, height, Rgba([index as u8, 10, 20, 255])))
    }
}

/// Opens anything starting with `%PDF` as a document of `page_count` pages
pub struct FakeRasterizer {
    pub page_count: usize,
}

impl PdfRasterizer for FakeRasterizer {
    fn open(&self, pdf: &[u8]) -> Result<Box<dyn PdfPages>, WorkerFault> {
        if !pdf.starts_with(b"%PDF") {
            return Err(WorkerFault::generic("missing PDF header"));
        }
        Ok(Box::new(FakePages {
            count: self.page_count,
        }))
    }
}

/// Ink source serving the same SVG for every page
pub struct FakeInk {
    svg: Option<Vec<u8>>,
}

impl FakeInk {
    pub fn blank() -> Self {
        Self {
            svg: Some(BLANK_INK.as_bytes().to_vec()),
        }
    }

    pub fn empty() -> Self {
        Self { svg: None }
    }
}

impl InkSource for FakeInk {
    fn page_svg(&self, _uuid: &str, _page_id: &str, _files: &HashMap<String, Vec<u8>>) -> Option<Vec<u8>> {
        self.svg.clone()
    }
}

/// Backends with a fake rasterizer and ink, and no browser
pub fn test_backends(page_count: usize) -> Backends {
    Backends::native()
        .with_rasterizer(Arc::new(FakeRasterizer { page_count }))
        .with_ink(Arc::new(FakeInk::blank()))
}

pub fn pdf_document(uuid: &str, page_count: usize) -> Document {
    let mut document = Document::new(uuid, Metadata::new(format!("{uuid}.pdf")), Content::pdf(page_count));
    document.insert_file(document.pdf_file_name(), b"%PDF-1.7 test".to_vec());
    document
}

pub fn notebook_document(uuid: &str, page_ids: &[&str]) -> Document {
    let mut document = Document::new(uuid, Metadata::new(uuid), Content::notebook(page_ids.iter().copied()));
    for page_id in page_ids {
        let name = document.page_svg_name(page_id);
        document.insert_file(name, BLANK_INK.as_bytes().to_vec());
    }
    document
}

pub fn unusable_document(uuid: &str) -> Document {
    Document::new(uuid, Metadata::new("Broken"), Content::unusable())
}

/// Poll until `done` holds, failing the test after five seconds
pub fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for condition");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Builder for scripted viewer input
#[derive(Default)]
pub struct ScenarioBuilder {
    events: Vec<InputEvent>,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_page(mut self) -> Self {
        self.events.extend(SimulatedEventSource::tap(Key::Right));
        self
    }

    pub fn previous_page(mut self) -> Self {
        self.events.extend(SimulatedEventSource::tap(Key::Left));
        self
    }

    pub fn click(mut self, x: i32, y: i32) -> Self {
        self.events.extend(SimulatedEventSource::click(x, y));
        self
    }

    pub fn wheel(mut self, dy: f32) -> Self {
        self.events.push(InputEvent::Wheel { dx: 0.0, dy });
        self
    }

    pub fn resize(mut self, width: u32, height: u32) -> Self {
        self.events.push(InputEvent::Resize { width, height });
        self
    }

    pub fn escape(mut self) -> Self {
        self.events.push(InputEvent::KeyDown(Key::Escape));
        self
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn build(self) -> SimulatedEventSource {
        SimulatedEventSource::new(self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_builder_expands_taps() {
        let scenario = ScenarioBuilder::new()
            .next_page()
            .next_page()
            .previous_page()
            .click(5, 5)
            .escape()
            .build();

        assert_eq!(scenario.events.len(), 9);
        assert_eq!(scenario.events[8], InputEvent::KeyDown(Key::Escape));
    }

    #[test]
    fn memory_registry_snapshots_uploads() {
        let registry = MemoryRegistry::with_documents([pdf_document("a", 2)]);
        let shared = registry.get("a").unwrap();
        shared.write().unwrap().metadata.last_opened_page = 1;

        registry.upload(&shared, true).unwrap();
        assert!(!shared.read().unwrap().is_loaded());
        let uploaded = registry.last_upload("a").unwrap();
        assert_eq!(uploaded.metadata.last_opened_page, 1);
        assert!(uploaded.pdf_raw().is_some());

        registry.set_fail_uploads(true);
        assert!(registry.upload(&shared, false).is_err());
        assert_eq!(registry.upload_count(), 1);
    }
}
