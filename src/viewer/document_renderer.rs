//! Per-document rendering pipeline
//!
//! [`DocumentRenderer`] picks a primary renderer for the content type, always
//! attaches the notebook ink overlay, and drives both once per frame. It owns
//! the zoom, pan and page navigation state.
//!
//! A frame runs in three steps: [`DocumentRenderer::pre_loop`] (first-frame
//! load, loading animation), [`DocumentRenderer::render_loop`] (content) and
//! [`DocumentRenderer::post_loop`] (error message, key repeat, debug overlay).

use std::sync::{Arc, PoisonError};
use std::time::Instant;

use log::{debug, error, info, warn};

use super::loading_indicator::LoadingIndicator;
use super::navigation::PageNavigator;
use super::state::{ErrorDisplay, RendererState};
use super::zoom::ZoomState;
use crate::canvas::{Canvas, colors};
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::{Point, Rect, Size};
use crate::input::{FrameContext, InputEvent, MouseButton};
use crate::model::{FileType, SharedDocument, ZoomMode};
use crate::renderer::{
    Backends, BrowserPdfRenderer, LoadContext, LoadingCounter, NativePdfRenderer,
    NotebookRenderer, NotebookSizeTracker, PrimaryRenderer, RenderContext, RenderStatus, Renderer,
};
use crate::settings::{NotebookRenderMode, PdfRenderMode, Settings};

const ERR_PDF_DISABLED: &str = "Could not render PDF";
const ERR_PDF_RETRY: &str = "Could not render PDF. Check your configuration";
const ERR_PDF_NO_BACKEND: &str = "Could not render PDF. Make sure you have a compatible PDF renderer";
const ERR_UNKNOWN_FORMAT: &str = "Unknown format. Could not render document";

/// Primary renderer for a content type, `None` for ink-only notebooks
pub fn select_primary(
    file_type: &FileType,
    settings: &Settings,
    backends: &Backends,
) -> ViewerResult<Option<PrimaryRenderer>> {
    match file_type {
        FileType::Pdf | FileType::Epub => match &settings.pdf_render_mode {
            PdfRenderMode::Cef => match backends.browser.clone() {
                Some(browser) => Ok(Some(PrimaryRenderer::Browser(BrowserPdfRenderer::new(
                    browser,
                    &settings.html_dir,
                )))),
                None => Err(ViewerError::backend_unavailable(ERR_PDF_NO_BACKEND)),
            },
            PdfRenderMode::PyMuPdf => match backends.rasterizer.clone() {
                Some(rasterizer) => Ok(Some(PrimaryRenderer::Native(NativePdfRenderer::new(rasterizer)))),
                None => Err(ViewerError::backend_unavailable(ERR_PDF_NO_BACKEND)),
            },
            PdfRenderMode::None => Err(ViewerError::backend_unavailable(ERR_PDF_DISABLED)),
            PdfRenderMode::Retry => Err(ViewerError::backend_unavailable(ERR_PDF_RETRY)),
            PdfRenderMode::Other(_) => Err(ViewerError::backend_unavailable(ERR_PDF_NO_BACKEND)),
        },
        FileType::Notebook => Ok(None),
        FileType::Unknown(kind) => {
            debug!("No renderer for file type {kind:?}");
            Err(ViewerError::unsupported(ERR_UNKNOWN_FORMAT))
        }
    }
}

pub struct DocumentRenderer {
    document: SharedDocument,
    settings: Settings,
    backends: Backends,
    size: Size,
    state: RendererState,
    loading: LoadingCounter,
    began_loading: bool,
    indicator: LoadingIndicator,
    zoom: ZoomState,
    navigator: PageNavigator,
    tracker: NotebookSizeTracker,
    renderer: Option<PrimaryRenderer>,
    notebook: Option<NotebookRenderer>,
    last_opened_uuid: String,
}

impl DocumentRenderer {
    /// Fails with [`ViewerError::UnusableContent`] before anything is attached
    pub fn new(
        document: SharedDocument,
        settings: Settings,
        backends: Backends,
        size: Size,
    ) -> ViewerResult<Self> {
        let (last_opened_uuid, current, page_count, base_zoom, tracker) = {
            let doc = document.read().unwrap_or_else(PoisonError::into_inner);
            if !doc.content.usable {
                return Err(ViewerError::UnusableContent {
                    uuid: doc.uuid.clone(),
                });
            }
            let c_pages = &doc.content.c_pages;
            let base_zoom = match doc.content.zoom.zoom_mode {
                ZoomMode::CustomFit => doc.content.zoom.custom_zoom_scale,
                _ => 1.0,
            };
            (
                c_pages.last_opened.value.clone(),
                c_pages.last_opened_index().unwrap_or(0),
                c_pages.len(),
                base_zoom,
                NotebookSizeTracker::for_orientation(doc.content.orientation),
            )
        };

        let notebook = match &settings.notebook_render_mode {
            NotebookRenderMode::RmLinesSvgInker => Some(NotebookRenderer::new(Arc::clone(&backends.ink))),
            NotebookRenderMode::Other(_) => None,
        };

        let mut renderer = Self {
            document,
            settings,
            backends,
            size,
            state: RendererState::NoContent,
            loading: LoadingCounter::new(),
            began_loading: false,
            indicator: LoadingIndicator::new(Instant::now()),
            zoom: ZoomState::with_base_zoom(base_zoom),
            navigator: PageNavigator::new(current, page_count),
            tracker,
            renderer: None,
            notebook,
            last_opened_uuid,
        };
        renderer.update_zoom_reference();
        Ok(renderer)
    }

    pub fn state(&self) -> &RendererState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    pub fn loading_counter(&self) -> &LoadingCounter {
        &self.loading
    }

    pub fn current_page_index(&self) -> usize {
        self.navigator.current()
    }

    pub fn last_opened_uuid(&self) -> &str {
        &self.last_opened_uuid
    }

    pub fn zoom_state(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn zoom(&self) -> f32 {
        self.zoom.zoom()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        if let RendererState::Error(display) = &self.state {
            self.state = RendererState::Error(ErrorDisplay::centered(display.message.clone(), size));
        }
        self.update_zoom_reference();
    }

    pub fn primary_renderer(&self) -> Option<&'static str> {
        self.renderer.as_ref().map(PrimaryRenderer::name)
    }

    pub fn has_overlay(&self) -> bool {
        self.notebook.is_some()
    }

    pub fn do_next(&mut self) {
        self.navigator.do_next();
    }

    pub fn do_previous(&mut self) {
        self.navigator.do_previous();
    }

    /// Enter the error state. Outstanding loads are forgotten.
    pub fn set_error(&mut self, message: impl Into<String>) -> &RendererState {
        let message = message.into();
        warn!("Document renderer error: {message}");
        self.loading.reset();
        self.state = RendererState::Error(ErrorDisplay::centered(message, self.size));
        &self.state
    }

    /// Show a renderer failure on screen
    fn fail(&mut self, e: ViewerError) {
        if !e.is_displayable() {
            error!("Renderer failed: {e:?}");
        }
        self.set_error(e.to_string());
    }

    /// Move from loading to ready once every load has completed
    pub fn poll_loading(&mut self) -> &RendererState {
        if self.state == RendererState::Loading && !self.loading.is_loading() {
            debug!("Document finished loading");
            self.state = RendererState::Ready;
        }
        &self.state
    }

    /// Screen size of the page frame at zoom 1.0
    fn fitted_page_size(&self) -> Size {
        Rect::new(0, 0, self.size.width, self.size.height)
            .fit_aspect(self.tracker.frame_size())
            .size()
    }

    /// On-screen rectangle of the current page
    pub fn page_rect(&self) -> Rect {
        let fitted = self.fitted_page_size();
        let zoom = self.zoom.zoom();
        Rect::centered_on(
            self.zoom.center(self.size),
            Size::new(
                (fitted.width as f32 * zoom).round() as u32,
                (fitted.height as f32 * zoom).round() as u32,
            ),
        )
    }

    fn update_zoom_reference(&mut self) {
        let fitted = self.fitted_page_size();
        self.zoom.reference_size = self.page_rect().size();
        self.zoom.scaling_offset = (
            -(fitted.width as f32) / 2.0,
            -(fitted.height as f32) / 2.0,
        );
    }

    /// Attach renderers for the content type and start loading them
    pub fn load(&mut self) {
        let shared = Arc::clone(&self.document);
        let document = shared.read().unwrap_or_else(PoisonError::into_inner);
        info!(
            "Loading {} ({}) as {}",
            document.uuid,
            document.metadata.visible_name,
            document.content.file_type.as_str()
        );
        self.state = RendererState::Loading;

        match select_primary(&document.content.file_type, &self.settings, &self.backends) {
            Ok(renderer) => self.renderer = renderer,
            Err(e) => self.fail(e),
        }

        if let Some(renderer) = self.renderer.as_mut() {
            let result = renderer.load(LoadContext {
                document: &document,
                settings: &self.settings,
                size: self.size,
                ticket: self.loading.begin(),
            });
            if let Err(e) = result {
                self.fail(e);
            }
        }

        match self.notebook.as_mut() {
            Some(notebook) => {
                let result = notebook.load(LoadContext {
                    document: &document,
                    settings: &self.settings,
                    size: self.size,
                    ticket: self.loading.begin(),
                });
                if let Err(e) = result {
                    self.fail(e);
                }
            }
            None => {
                let message = format!(
                    "Notebook render mode `{}` unavailable",
                    self.settings.notebook_render_mode.as_str()
                );
                error!("{message}");
                self.set_error(message);
            }
        }
    }

    /// Close and load the primary renderer again after it lost its state
    fn reload_primary(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        info!("Reloading {} renderer", renderer.name());
        renderer.close();

        let shared = Arc::clone(&self.document);
        let document = shared.read().unwrap_or_else(PoisonError::into_inner);
        if self.state == RendererState::Ready {
            self.state = RendererState::Loading;
        }
        let result = renderer.load(LoadContext {
            document: &document,
            settings: &self.settings,
            size: self.size,
            ticket: self.loading.begin(),
        });
        if let Err(e) = result {
            self.fail(e);
        }
    }

    pub fn handle_event(&mut self, event: &InputEvent, frame: &FrameContext) {
        if let InputEvent::Resize { width, height } = event {
            self.set_size(Size::new(*width, *height));
            return;
        }
        if self.state.is_closed() {
            return;
        }
        if self.loading.is_loading() {
            self.navigator.clear_hold();
            return;
        }

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.handle_event(event, self.settings.debug);
        }
        self.handle_navigation(event, frame);
    }

    fn handle_navigation(&mut self, event: &InputEvent, frame: &FrameContext) {
        match event {
            InputEvent::Wheel { dy, .. } if frame.modifiers.ctrl => {
                self.update_zoom_reference();
                if self
                    .zoom
                    .apply_wheel(*dy, frame.delta_time, frame.mouse_pos, self.size, frame.now)
                {
                    self.update_zoom_reference();
                }
            }
            InputEvent::KeyDown(key) => self.navigator.key_down(*key, frame.now),
            InputEvent::KeyUp(key) => self.navigator.key_up(*key),
            InputEvent::PointerDown {
                button: MouseButton::Left,
                pos,
            } => self.zoom.begin_drag(*pos),
            InputEvent::PointerMoved { pos } => {
                if self.zoom.is_dragging() {
                    self.zoom.drag_to(*pos);
                }
            }
            InputEvent::PointerUp {
                button: MouseButton::Left,
                ..
            } => self.zoom.end_drag(),
            _ => {}
        }
    }

    pub fn pre_loop(&mut self, canvas: &mut dyn Canvas, frame: &FrameContext) {
        if !self.began_loading {
            self.began_loading = true;
            self.load();
        }
        self.poll_loading();

        if self.settings.debug {
            canvas.fill(colors::DEBUG_VEIL);
        }
        if self.loading.is_loading() {
            self.indicator.draw(canvas, frame.now);
        }
    }

    pub fn render_loop(&mut self, canvas: &mut dyn Canvas, frame: &FrameContext) {
        let shared = Arc::clone(&self.document);
        let document = shared.read().unwrap_or_else(PoisonError::into_inner);
        let Some(page) = document.content.c_pages.pages.get(self.navigator.current()) else {
            return;
        };
        self.last_opened_uuid.clone_from(&page.id);

        if self.loading.is_loading() || self.state.is_closed() {
            return;
        }

        let mut ctx = RenderContext {
            document: &document,
            canvas,
            size: self.size,
            zoom: self.zoom.zoom(),
            page_rect: self.page_rect(),
            zoom_ready: self.zoom.zoom_ready(frame.now),
            debug: self.settings.debug,
        };

        let mut reload = false;
        let mut failure = None;
        if let Some(renderer) = self.renderer.as_mut() {
            match renderer.render(&page.id, &mut ctx) {
                Ok(RenderStatus::ReloadRequested) => reload = true,
                Ok(_) => {}
                Err(e) => {
                    renderer.close();
                    self.renderer = None;
                    failure = Some(e);
                }
            }
        }
        if let Some(notebook) = self.notebook.as_mut() {
            if let Err(e) = notebook.render(&page.id, &mut ctx) {
                notebook.close();
                self.notebook = None;
                failure.get_or_insert(e);
            }
        }
        drop(document);

        if let Some(e) = failure {
            self.fail(e);
        } else if reload {
            self.reload_primary();
        }
    }

    pub fn post_loop(&mut self, canvas: &mut dyn Canvas, frame: &FrameContext) {
        if let Some(display) = self.state.error() {
            display.draw(canvas);
        }
        self.navigator.tick(frame.now);

        if self.settings.debug {
            canvas.draw_circle(self.zoom.pos, 5, colors::RED);
            let text = self.debug_text(frame.mouse_pos);
            let anchor = Point::new(self.size.width as i32, self.size.height as i32);
            canvas.draw_text(&text, anchor, colors::WHITE);
        }
    }

    /// One full frame
    pub fn frame(&mut self, canvas: &mut dyn Canvas, frame: &FrameContext) {
        self.pre_loop(canvas, frame);
        self.render_loop(canvas, frame);
        self.post_loop(canvas, frame);
    }

    /// Zoom, pan center, page and the device position under the cursor
    pub fn debug_text(&self, mouse: Point) -> String {
        let center = self.zoom.center(self.size);
        let reference = self.zoom.reference_size;
        let device = |m: i32, c: i32, reference: u32, frame: u32| {
            if reference == 0 {
                return 0.0;
            }
            let reference = reference as f32;
            (((m - c) as f32 + reference / 2.0) / reference) * frame as f32
        };
        let (x, y) = if self.notebook.is_some() {
            (
                device(mouse.x, center.x, reference.width, self.tracker.frame_width),
                device(mouse.y, center.y, reference.height, self.tracker.frame_height),
            )
        } else {
            (0.0, 0.0)
        };
        format!(
            "Zoom: {:.2} * {:.2} | Center: ({}, {}) | Page: {} | RM Pos: {x:.2}, {y:.2}",
            self.zoom.base_zoom,
            self.zoom.user_zoom(),
            center.x,
            center.y,
            self.navigator.current(),
        )
    }

    /// Release every renderer. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.close();
        }
        if let Some(notebook) = self.notebook.as_mut() {
            notebook.close();
        }
        self.state = RendererState::Closed;
    }
}
