//! Background uploads with retained handles
//!
//! Every upload thread's handle is kept until it is reaped by
//! [`UploadTracker::poll`] or joined at a checkpoint. Failures are logged when
//! reaped; they never reach the frame loop.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use log::{debug, error, info};

use crate::model::SharedDocument;
use crate::registry::DocumentRegistry;

struct PendingUpload {
    /// Documents covered by the upload
    uuids: Vec<String>,
    handle: JoinHandle<Result<()>>,
}

#[derive(Clone, Default)]
pub struct UploadTracker {
    pending: Arc<Mutex<Vec<PendingUpload>>>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload one document on a background thread
    pub fn spawn(&self, registry: Arc<dyn DocumentRegistry>, document: SharedDocument, unload: bool) {
        let uuid = uuid_of(&document);
        let name = format!("upload-{uuid}");
        self.start(vec![uuid], name, move || registry.upload(&document, unload));
    }

    /// Upload several documents together on one background thread
    pub fn spawn_batch(&self, registry: Arc<dyn DocumentRegistry>, documents: Vec<SharedDocument>) {
        let uuids: Vec<String> = documents.iter().map(uuid_of).collect();
        let name = format!("upload-batch-{}", uuids.len());
        self.start(uuids, name, move || registry.upload_many(&documents));
    }

    fn start<F>(&self, uuids: Vec<String>, name: String, job: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        debug!("Starting upload of {uuids:?}");
        match thread::Builder::new().name(name).spawn(job) {
            Ok(handle) => self.lock().push(PendingUpload { uuids, handle }),
            Err(e) => error!("Failed to start upload thread for {uuids:?}: {e}"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PendingUpload>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reap finished uploads; returns how many finished
    pub fn poll(&self) -> usize {
        let finished: Vec<PendingUpload> = {
            let mut pending = self.lock();
            let (done, running) = pending.drain(..).partition(|upload| upload.handle.is_finished());
            *pending = running;
            done
        };
        let count = finished.len();
        finished.into_iter().for_each(reap);
        count
    }

    pub fn is_pending(&self, uuid: &str) -> bool {
        self.lock()
            .iter()
            .any(|upload| upload.uuids.iter().any(|pending| pending == uuid))
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    /// Block until every upload touching `uuid` has finished
    pub fn wait_for(&self, uuid: &str) {
        let waiting: Vec<PendingUpload> = {
            let mut pending = self.lock();
            let (matching, rest) = pending
                .drain(..)
                .partition(|upload| upload.uuids.iter().any(|pending| pending == uuid));
            *pending = rest;
            matching
        };
        if !waiting.is_empty() {
            info!("Waiting for pending upload of {uuid}");
        }
        waiting.into_iter().for_each(reap);
    }

    /// Block until every upload has finished
    pub fn wait_all(&self) {
        let waiting: Vec<PendingUpload> = self.lock().drain(..).collect();
        if !waiting.is_empty() {
            info!("Waiting for {} pending uploads", waiting.len());
        }
        waiting.into_iter().for_each(reap);
    }
}

fn uuid_of(document: &SharedDocument) -> String {
    document
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .uuid
        .clone()
}

fn reap(upload: PendingUpload) {
    match upload.handle.join() {
        Ok(Ok(())) => debug!("Upload of {:?} finished", upload.uuids),
        Ok(Err(e)) => error!("Upload of {:?} failed: {e:#}", upload.uuids),
        Err(_) => error!("Upload thread for {:?} panicked", upload.uuids),
    }
}
