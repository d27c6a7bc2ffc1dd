//! Native PDF rendering on a worker thread
//!
//! The frame thread never rasterizes. It posts [`RasterRequest`]s to a worker
//! that owns the opened document, and collects [`RasterResponse`]s into an LRU
//! cache on the next frames.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use flume::{Receiver, Sender};
use image::RgbaImage;
use log::{debug, error, warn};
use lru::LruCache;

use super::{LoadContext, LoadingTicket, RenderContext, RenderStatus, Renderer};
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::Size;
use crate::input::InputEvent;

const CACHE_CAPACITY: usize = 16;

/// Errors from the raster worker
#[derive(Debug, thiserror::Error)]
pub enum WorkerFault {
    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {page} out of range ({count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("{detail}")]
    Generic { detail: String },
}

impl WorkerFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Opens PDF bytes into something that can rasterize pages
pub trait PdfRasterizer: Send + Sync {
    fn open(&self, pdf: &[u8]) -> Result<Box<dyn PdfPages>, WorkerFault>;
}

/// An opened PDF, owned by the worker thread
pub trait PdfPages {
    fn page_count(&self) -> usize;

    /// Rasterize a page; `scale` 1.0 is the page's natural size
    fn render_page(&mut self, index: usize, scale: f32) -> Result<RgbaImage, WorkerFault>;
}

/// Request sent to the raster worker
#[derive(Debug)]
pub enum RasterRequest {
    Page { page: usize, scale: f32 },
    Shutdown,
}

/// Response from the raster worker
#[derive(Debug)]
pub enum RasterResponse {
    /// Sent once the document opened
    Opened { page_count: usize },
    Page {
        page: usize,
        scale_key: u32,
        image: Arc<RgbaImage>,
    },
    /// `page` is `None` when the document itself could not be opened
    Error {
        page: Option<usize>,
        error: WorkerFault,
    },
}

/// Cache key for rasterized pages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub page: usize,
    /// Scale in hundredths for stable hashing
    pub scale_key: u32,
}

impl CacheKey {
    #[must_use]
    pub fn new(page: usize, scale: f32) -> Self {
        Self {
            page,
            scale_key: scale_key(scale),
        }
    }
}

fn scale_key(scale: f32) -> u32 {
    (scale * 100.0).round() as u32
}

/// Worker loop. Owns the document for its whole life.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
fn raster_worker(
    rasterizer: Arc<dyn PdfRasterizer>,
    pdf: Vec<u8>,
    ticket: LoadingTicket,
    requests: Receiver<RasterRequest>,
    responses: Sender<RasterResponse>,
) {
    let mut pages = match rasterizer.open(&pdf) {
        Ok(pages) => pages,
        Err(e) => {
            error!("Failed to open PDF: {e}");
            let _ = responses.send(RasterResponse::Error {
                page: None,
                error: e,
            });
            // Dropping the ticket releases the load so the error can surface
            drop(ticket);
            return;
        }
    };
    drop(pdf);

    let page_count = pages.page_count();
    debug!("Raster worker opened PDF with {page_count} pages");
    let _ = responses.send(RasterResponse::Opened { page_count });
    ticket.complete();

    while let Ok(request) = requests.recv() {
        // Only the newest page request matters; the frame loop re-asks anyway
        let mut latest = request;
        for next in requests.try_iter() {
            if matches!(latest, RasterRequest::Shutdown) {
                break;
            }
            latest = next;
        }

        match latest {
            RasterRequest::Page { page, scale } => {
                let response = if page >= page_count {
                    RasterResponse::Error {
                        page: Some(page),
                        error: WorkerFault::PageOutOfRange {
                            page,
                            count: page_count,
                        },
                    }
                } else {
                    match pages.render_page(page, scale) {
                        Ok(image) => RasterResponse::Page {
                            page,
                            scale_key: scale_key(scale),
                            image: Arc::new(image),
                        },
                        Err(error) => RasterResponse::Error {
                            page: Some(page),
                            error,
                        },
                    }
                };
                if responses.send(response).is_err() {
                    break;
                }
            }
            RasterRequest::Shutdown => break,
        }
    }
    debug!("Raster worker stopped");
}

pub struct NativePdfRenderer {
    rasterizer: Arc<dyn PdfRasterizer>,
    requests: Option<Sender<RasterRequest>>,
    responses: Option<Receiver<RasterResponse>>,
    cache: LruCache<CacheKey, Arc<RgbaImage>>,
    page_count: Option<usize>,
    pending: Option<CacheKey>,
    /// Last image drawn; shown while a sharper one renders
    shown: Option<(CacheKey, Arc<RgbaImage>)>,
    failed_pages: HashSet<usize>,
    open_error: Option<String>,
}

impl NativePdfRenderer {
    pub fn new(rasterizer: Arc<dyn PdfRasterizer>) -> Self {
        Self {
            rasterizer,
            requests: None,
            responses: None,
            cache: LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ),
            page_count: None,
            pending: None,
            shown: None,
            failed_pages: HashSet::new(),
            open_error: None,
        }
    }

    pub fn page_count(&self) -> Option<usize> {
        self.page_count
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    fn drain_responses(&mut self) {
        let Some(responses) = self.responses.as_ref() else {
            return;
        };
        for response in responses.try_iter() {
            match response {
                RasterResponse::Opened { page_count } => self.page_count = Some(page_count),
                RasterResponse::Page {
                    page,
                    scale_key,
                    image,
                } => {
                    let key = CacheKey { page, scale_key };
                    if self.pending == Some(key) {
                        self.pending = None;
                    }
                    self.cache.put(key, image);
                }
                RasterResponse::Error { page: None, error } => {
                    self.open_error = Some(error.to_string());
                }
                RasterResponse::Error {
                    page: Some(page),
                    error,
                } => {
                    warn!("Failed to render PDF page {page}: {error}");
                    self.failed_pages.insert(page);
                    if self.pending.is_some_and(|key| key.page == page) {
                        self.pending = None;
                    }
                }
            }
        }
    }

    fn request(&mut self, key: CacheKey, scale: f32) {
        if self.pending == Some(key) {
            return;
        }
        if let Some(requests) = self.requests.as_ref() {
            if requests
                .send(RasterRequest::Page {
                    page: key.page,
                    scale,
                })
                .is_ok()
            {
                self.pending = Some(key);
            }
        }
    }
}

impl Renderer for NativePdfRenderer {
    fn load(&mut self, ctx: LoadContext<'_>) -> ViewerResult<()> {
        let LoadContext {
            document, ticket, ..
        } = ctx;

        let Some(pdf) = document.pdf_raw() else {
            drop(ticket);
            return Err(ViewerError::backend_unavailable(format!(
                "No PDF data for {}",
                document.metadata.visible_name
            )));
        };

        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let rasterizer = Arc::clone(&self.rasterizer);
        let pdf = pdf.to_vec();

        thread::Builder::new()
            .name(format!("pdf-raster-{}", document.uuid))
            .spawn(move || raster_worker(rasterizer, pdf, ticket, request_rx, response_tx))
            .map_err(|e| ViewerError::backend_unavailable(format!("Failed to start PDF worker: {e}")))?;

        self.requests = Some(request_tx);
        self.responses = Some(response_rx);
        Ok(())
    }

    fn handle_event(&mut self, _event: &InputEvent, _debug: bool) {}

    fn render(&mut self, page_id: &str, ctx: &mut RenderContext<'_>) -> ViewerResult<RenderStatus> {
        self.drain_responses();
        if let Some(err) = self.open_error.take() {
            self.close();
            return Err(ViewerError::backend_unavailable(format!("Could not open PDF: {err}")));
        }
        if self.requests.is_none() {
            return Ok(RenderStatus::Waiting);
        }

        let Some(page) = ctx
            .document
            .content
            .c_pages
            .page(page_id)
            .and_then(|page| page.pdf_page())
        else {
            return Ok(RenderStatus::Waiting);
        };
        if self.page_count.is_some_and(|count| page >= count) || self.failed_pages.contains(&page) {
            return Ok(RenderStatus::Waiting);
        }

        // Hold the current resolution until wheel zoom settles
        let scale = match (&self.shown, ctx.zoom_ready) {
            (Some((key, _)), false) if key.page == page => key.scale_key as f32 / 100.0,
            _ => self.enhance_scale(ctx.zoom),
        };
        let key = CacheKey::new(page, scale);

        let image = match self.cache.get(&key) {
            Some(image) => Arc::clone(image),
            None => {
                self.request(key, scale);
                match &self.shown {
                    Some((shown_key, image)) if shown_key.page == page => Arc::clone(image),
                    _ => return Ok(RenderStatus::Waiting),
                }
            }
        };

        let dest = ctx
            .page_rect
            .fit_aspect(Size::new(image.width(), image.height()));
        ctx.canvas.blit(&image, dest);
        if self.cache.contains(&key) {
            self.shown = Some((key, image));
        }
        Ok(RenderStatus::Rendered)
    }

    fn close(&mut self) {
        if let Some(requests) = self.requests.take() {
            let _ = requests.send(RasterRequest::Shutdown);
        }
        self.responses = None;
        self.pending = None;
    }
}
