//! Per-document viewer session
//!
//! [`DocumentViewer`] acquires a document from the registry, drives its
//! [`DocumentRenderer`] together with the viewer chrome, and owns the close
//! path: write the reading position back and upload, or drop the local blobs.

use std::sync::{Arc, PoisonError};

use log::{debug, info, warn};

use super::chrome::CloseButton;
use super::denylist::ProblematicDocuments;
use super::document_renderer::DocumentRenderer;
use super::uploads::UploadTracker;
use crate::canvas::Canvas;
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::Size;
use crate::input::{FrameContext, InputEvent, Key, MouseButton};
use crate::model::{SharedDocument, now_time};
use crate::registry::DocumentRegistry;
use crate::renderer::Backends;
use crate::settings::Settings;

/// Application-lifetime collaborators shared by every session
#[derive(Clone)]
pub struct ViewerServices {
    pub registry: Arc<dyn DocumentRegistry>,
    pub backends: Backends,
    pub problematic: ProblematicDocuments,
    pub uploads: UploadTracker,
}

impl ViewerServices {
    pub fn new(registry: Arc<dyn DocumentRegistry>, backends: Backends) -> Self {
        Self {
            registry,
            backends,
            problematic: ProblematicDocuments::new(),
            uploads: UploadTracker::new(),
        }
    }
}

/// What the owner of the session should do after an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerAction {
    None,
    CloseRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Reading position written back, upload running in the background
    Uploading,
    /// Local blobs released without uploading
    Unloaded,
    AlreadyClosed,
}

pub struct DocumentViewer {
    uuid: String,
    document: SharedDocument,
    settings: Settings,
    renderer: DocumentRenderer,
    close_button: CloseButton,
    closed: bool,
}

impl DocumentViewer {
    pub fn open(services: &ViewerServices, uuid: &str, settings: Settings, size: Size) -> ViewerResult<Self> {
        if services.problematic.contains(uuid) {
            debug!("Refusing to open problematic document {uuid}");
            return Err(ViewerError::CannotRenderDocument {
                uuid: uuid.to_string(),
                visible_name: uuid.to_string(),
            });
        }

        // A previous session's upload must land before the document is reused
        services.uploads.wait_for(uuid);

        let document = services
            .registry
            .get(uuid)
            .ok_or_else(|| ViewerError::DocumentNotFound(uuid.to_string()))?;
        services.registry.check_integrity(&document)?;

        let renderer = match DocumentRenderer::new(
            Arc::clone(&document),
            settings.clone(),
            services.backends.clone(),
            size,
        ) {
            Ok(renderer) => renderer,
            Err(ViewerError::UnusableContent { .. }) => {
                services.problematic.insert(uuid);
                let visible_name = document
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .metadata
                    .visible_name
                    .clone();
                warn!("Document {uuid} ({visible_name}) has unusable content");
                return Err(ViewerError::CannotRenderDocument {
                    uuid: uuid.to_string(),
                    visible_name,
                });
            }
            Err(e) => return Err(e),
        };

        info!("Opened viewer for {uuid}");
        Ok(Self {
            uuid: uuid.to_string(),
            document,
            settings,
            renderer,
            close_button: CloseButton::new(size),
            closed: false,
        })
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn renderer(&self) -> &DocumentRenderer {
        &self.renderer
    }

    pub fn close_button(&self) -> &CloseButton {
        &self.close_button
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn handle_event(&mut self, event: &InputEvent, frame: &FrameContext) -> ViewerAction {
        if self.closed {
            return ViewerAction::None;
        }
        if let InputEvent::Resize { width, height } = event {
            self.resize(Size::new(*width, *height));
            return ViewerAction::None;
        }

        match event {
            InputEvent::PointerMoved { pos } => self.close_button.hover(*pos),
            InputEvent::PointerDown {
                button: MouseButton::Left,
                pos,
            } if self.close_button.hit(*pos) => return ViewerAction::CloseRequested,
            _ => {}
        }

        self.renderer.handle_event(event, frame);
        if event.key_down(Key::Escape) {
            return ViewerAction::CloseRequested;
        }
        ViewerAction::None
    }

    pub fn resize(&mut self, size: Size) {
        debug!("Viewer resized to {}x{}", size.width, size.height);
        self.close_button.align(size);
        self.renderer.set_size(size);
    }

    pub fn frame(&mut self, canvas: &mut dyn Canvas, frame: &FrameContext) {
        if self.closed {
            return;
        }
        self.renderer.frame(canvas, frame);
        self.close_button.draw(canvas);
    }

    /// Tear down the session. Exactly one of the upload and unload paths runs.
    pub fn close(&mut self, services: &ViewerServices) -> CloseOutcome {
        if self.closed {
            return CloseOutcome::AlreadyClosed;
        }
        self.closed = true;
        self.renderer.close();

        if self.settings.save_after_close {
            {
                let mut document = self.document.write().unwrap_or_else(PoisonError::into_inner);
                document.content.c_pages.last_opened.value = self.renderer.last_opened_uuid().to_string();
                document.metadata.last_opened_page = self.renderer.current_page_index();
                document.metadata.last_opened = now_time();
            }
            // Spawned only after the write-back above is complete
            services.uploads.spawn(
                Arc::clone(&services.registry),
                Arc::clone(&self.document),
                true,
            );
            info!("Closed {} and scheduled upload", self.uuid);
            CloseOutcome::Uploading
        } else {
            self.document
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .unload_files();
            info!("Closed {} without saving", self.uuid);
            CloseOutcome::Unloaded
        }
    }
}
