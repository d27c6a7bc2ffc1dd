//! Content renderers
//!
//! Every content backend satisfies [`Renderer`]. The primary renderer for a
//! document is one variant of [`PrimaryRenderer`]; the notebook ink overlay is
//! always attached next to it.

pub mod browser;
pub mod loading;
#[cfg(feature = "pdf")]
pub mod mupdf_backend;
pub mod native;
pub mod notebook;

use std::sync::Arc;

use crate::canvas::Canvas;
use crate::error::ViewerResult;
use crate::geometry::{Rect, Size};
use crate::input::InputEvent;
use crate::model::Document;
use crate::settings::Settings;

pub use browser::{BrowserBackend, BrowserPdfRenderer, BrowserSession};
pub use loading::{LoadingCounter, LoadingTicket};
pub use native::{NativePdfRenderer, PdfPages, PdfRasterizer, WorkerFault};
pub use notebook::{InkSource, NotebookRenderer, NotebookSizeTracker, StoredSvgInk};

/// Everything a renderer may look at while preparing its content
pub struct LoadContext<'a> {
    pub document: &'a Document,
    pub settings: &'a Settings,
    pub size: Size,
    /// Released once the renderer can draw, or has failed for good
    pub ticket: LoadingTicket,
}

/// Per-frame drawing state
pub struct RenderContext<'a> {
    pub document: &'a Document,
    pub canvas: &'a mut dyn Canvas,
    pub size: Size,
    /// `base_zoom * user_zoom`
    pub zoom: f32,
    /// On-screen rectangle of the current page frame
    pub page_rect: Rect,
    /// False while wheel zoom is still settling
    pub zoom_ready: bool,
    pub debug: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    Rendered,
    /// Nothing drawable yet
    Waiting,
    /// The backend lost its state; close and load again
    ReloadRequested,
}

pub trait Renderer {
    fn load(&mut self, ctx: LoadContext<'_>) -> ViewerResult<()>;

    fn handle_event(&mut self, event: &InputEvent, debug: bool);

    fn render(&mut self, page_id: &str, ctx: &mut RenderContext<'_>) -> ViewerResult<RenderStatus>;

    /// Release backend resources. Safe to call repeatedly.
    fn close(&mut self);

    fn enhance_scale(&self, zoom: f32) -> f32 {
        enhance_scale(zoom)
    }
}

/// Supersampling multiplier for a zoom factor: 1.0 to 3.0 in steps of 0.5
pub fn enhance_scale(zoom: f32) -> f32 {
    if !zoom.is_finite() {
        return 1.0;
    }
    (zoom / 0.5).floor().clamp(2.0, 6.0) * 0.5
}

/// Primary renderer variants for PDF-backed content
pub enum PrimaryRenderer {
    Browser(BrowserPdfRenderer),
    Native(NativePdfRenderer),
}

impl PrimaryRenderer {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Browser(_) => "browser",
            Self::Native(_) => "native",
        }
    }
}

impl Renderer for PrimaryRenderer {
    fn load(&mut self, ctx: LoadContext<'_>) -> ViewerResult<()> {
        match self {
            Self::Browser(renderer) => renderer.load(ctx),
            Self::Native(renderer) => renderer.load(ctx),
        }
    }

    fn handle_event(&mut self, event: &InputEvent, debug: bool) {
        match self {
            Self::Browser(renderer) => renderer.handle_event(event, debug),
            Self::Native(renderer) => renderer.handle_event(event, debug),
        }
    }

    fn render(&mut self, page_id: &str, ctx: &mut RenderContext<'_>) -> ViewerResult<RenderStatus> {
        match self {
            Self::Browser(renderer) => renderer.render(page_id, ctx),
            Self::Native(renderer) => renderer.render(page_id, ctx),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Browser(renderer) => renderer.close(),
            Self::Native(renderer) => renderer.close(),
        }
    }
}

/// Rendering backends available to the viewer
#[derive(Clone)]
pub struct Backends {
    pub browser: Option<Arc<dyn BrowserBackend>>,
    pub rasterizer: Option<Arc<dyn PdfRasterizer>>,
    pub ink: Arc<dyn InkSource>,
}

impl Backends {
    /// Backends compiled into this build; no embedded browser ships with it
    pub fn native() -> Self {
        Self {
            browser: None,
            rasterizer: default_rasterizer(),
            ink: Arc::new(StoredSvgInk),
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserBackend>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PdfRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn with_ink(mut self, ink: Arc<dyn InkSource>) -> Self {
        self.ink = ink;
        self
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(feature = "pdf")]
fn default_rasterizer() -> Option<Arc<dyn PdfRasterizer>> {
    Some(Arc::new(mupdf_backend::MupdfRasterizer))
}

#[cfg(not(feature = "pdf"))]
fn default_rasterizer() -> Option<Arc<dyn PdfRasterizer>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhance_scale_steps() {
        assert_eq!(enhance_scale(0.0), 1.0);
        assert_eq!(enhance_scale(0.2), 1.0);
        assert_eq!(enhance_scale(1.0), 1.0);
        assert_eq!(enhance_scale(1.49), 1.0);
        assert_eq!(enhance_scale(1.5), 1.5);
        assert_eq!(enhance_scale(2.2), 2.0);
        assert_eq!(enhance_scale(2.75), 2.5);
        assert_eq!(enhance_scale(3.0), 3.0);
        assert_eq!(enhance_scale(9.0), 3.0);
        assert_eq!(enhance_scale(f32::NAN), 1.0);
    }

    #[test]
    fn enhance_scale_stays_in_discrete_set() {
        let allowed = [1.0, 1.5, 2.0, 2.5, 3.0];
        let mut zoom = 0.0;
        while zoom < 12.0 {
            assert!(allowed.contains(&enhance_scale(zoom)), "zoom {zoom}");
            zoom += 0.013;
        }
    }
}
