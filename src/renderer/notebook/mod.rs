//! Vector-ink notebook overlay
//!
//! Attached to every document, whatever its primary renderer. Ink is
//! collected on a background thread and tiled lazily per page.

pub mod expanded;
#[cfg(feature = "svg")]
pub mod svg;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use flume::Receiver;
use log::{debug, info};

use super::{LoadContext, RenderContext, RenderStatus, Renderer};
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::{Rect, Size};
use crate::input::InputEvent;

pub use expanded::{ExpandedNotebook, Frame, NotebookSizeTracker, visible_frame_coords};

/// Raster scale of ink tiles at enhance scale 1.0
const INK_BASE_SCALE: f32 = 0.5;

/// Supplies the ink of a page as SVG
pub trait InkSource: Send + Sync {
    fn page_svg(&self, uuid: &str, page_id: &str, files: &HashMap<String, Vec<u8>>) -> Option<Vec<u8>>;
}

/// Reads ink from `<uuid>/<page_id>.svg` blobs
pub struct StoredSvgInk;

impl InkSource for StoredSvgInk {
    fn page_svg(&self, uuid: &str, page_id: &str, files: &HashMap<String, Vec<u8>>) -> Option<Vec<u8>> {
        files.get(&format!("{uuid}/{page_id}.svg")).cloned()
    }
}

pub struct NotebookRenderer {
    ink: Arc<dyn InkSource>,
    tracker: NotebookSizeTracker,
    incoming: Option<Receiver<(String, Vec<u8>)>>,
    svgs: HashMap<String, Vec<u8>>,
    #[cfg(feature = "svg")]
    cache: svg::InkCache,
    scale: f32,
}

impl NotebookRenderer {
    pub fn new(ink: Arc<dyn InkSource>) -> Self {
        Self {
            ink,
            tracker: NotebookSizeTracker::PORTRAIT,
            incoming: None,
            svgs: HashMap::new(),
            #[cfg(feature = "svg")]
            cache: svg::InkCache::new(),
            scale: INK_BASE_SCALE,
        }
    }

    /// Device page size for the loaded document
    pub fn frame_size(&self) -> Size {
        self.tracker.frame_size()
    }

    pub fn tracker(&self) -> NotebookSizeTracker {
        self.tracker
    }

    /// True once the loader has delivered ink for the page
    pub fn has_ink(&mut self, page_id: &str) -> bool {
        self.drain_incoming();
        self.svgs.contains_key(page_id)
    }

    /// Parsed pages currently held in memory
    #[cfg(feature = "svg")]
    pub fn cached_pages(&self) -> usize {
        self.cache.cached_pages()
    }

    fn drain_incoming(&mut self) {
        if let Some(incoming) = self.incoming.as_ref() {
            self.svgs.extend(incoming.try_iter());
        }
    }

    /// Visible part of the page in document units
    fn visible_area(&self, page_rect: Rect, size: Size) -> Option<Rect> {
        if page_rect.width == 0 || page_rect.height == 0 {
            return None;
        }
        let (fw, fh) = (i64::from(self.tracker.frame_width), i64::from(self.tracker.frame_height));
        let (pw, ph) = (i64::from(page_rect.width), i64::from(page_rect.height));
        let x = (-i64::from(page_rect.x) * fw).div_euclid(pw);
        let y = (-i64::from(page_rect.y) * fh).div_euclid(ph);
        let width = (u64::from(size.width) * fw as u64).div_ceil(pw as u64);
        let height = (u64::from(size.height) * fh as u64).div_ceil(ph as u64);
        Some(Rect::new(
            i32::try_from(x).ok()?,
            i32::try_from(y).ok()?,
            u32::try_from(width).ok()?,
            u32::try_from(height).ok()?,
        ))
    }

    /// On-screen rectangle of a frame
    fn frame_rect(&self, frame: &Frame, page_rect: Rect) -> Rect {
        let px_x = page_rect.width as f32 / self.tracker.frame_width as f32;
        let px_y = page_rect.height as f32 / self.tracker.frame_height as f32;
        let bounds = frame.bounds();
        Rect::new(
            page_rect.x + (bounds.x as f32 * px_x).round() as i32,
            page_rect.y + (bounds.y as f32 * px_y).round() as i32,
            (bounds.width as f32 * px_x).round() as u32,
            (bounds.height as f32 * px_y).round() as u32,
        )
    }
}

impl Renderer for NotebookRenderer {
    fn load(&mut self, ctx: LoadContext<'_>) -> ViewerResult<()> {
        let LoadContext {
            document, ticket, ..
        } = ctx;

        if cfg!(not(feature = "svg")) {
            drop(ticket);
            return Err(ViewerError::backend_unavailable(
                "Ink rendering requires the svg feature",
            ));
        }

        self.tracker = NotebookSizeTracker::for_orientation(document.content.orientation);

        let uuid = document.uuid.clone();
        let prefix = format!("{uuid}/");
        let files: HashMap<String, Vec<u8>> = document
            .files
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(name, data)| (name.clone(), data.clone()))
            .collect();
        let page_ids: Vec<String> = document
            .content
            .c_pages
            .pages
            .iter()
            .map(|page| page.id.clone())
            .collect();
        let ink = Arc::clone(&self.ink);
        let (tx, rx) = flume::unbounded();

        thread::Builder::new()
            .name(format!("ink-loader-{uuid}"))
            .spawn(move || {
                let mut found = 0;
                for page_id in page_ids {
                    if let Some(svg) = ink.page_svg(&uuid, &page_id, &files) {
                        found += 1;
                        if tx.send((page_id, svg)).is_err() {
                            // Renderer closed; nobody is waiting for the rest
                            return;
                        }
                    }
                }
                debug!("Loaded ink for {found} pages of {uuid}");
                ticket.complete();
            })
            .map_err(|e| ViewerError::backend_unavailable(format!("Failed to start ink loader: {e}")))?;

        self.incoming = Some(rx);
        Ok(())
    }

    fn handle_event(&mut self, _event: &InputEvent, _debug: bool) {}

    #[cfg(feature = "svg")]
    fn render(&mut self, page_id: &str, ctx: &mut RenderContext<'_>) -> ViewerResult<RenderStatus> {
        self.drain_incoming();
        if !self.cache.contains_page(page_id) {
            let Some(svg) = self.svgs.get(page_id) else {
                return Ok(RenderStatus::Waiting);
            };
            let Some(notebook) = svg::SvgNotebook::parse(svg, self.tracker) else {
                self.svgs.remove(page_id);
                return Ok(RenderStatus::Waiting);
            };
            info!("Prepared ink for page {page_id}");
            self.cache.insert_page(page_id, notebook);
        }

        if ctx.zoom_ready {
            self.scale = self.enhance_scale(ctx.zoom) * INK_BASE_SCALE;
        }
        let Some(area) = self.visible_area(ctx.page_rect, ctx.size) else {
            return Ok(RenderStatus::Waiting);
        };
        let Some(frames) = self.cache.page_frames(page_id, self.scale, area) else {
            return Ok(RenderStatus::Waiting);
        };
        for frame in &frames {
            let dest = self.frame_rect(frame, ctx.page_rect);
            ctx.canvas.blit(&frame.image, dest);
        }
        Ok(RenderStatus::Rendered)
    }

    #[cfg(not(feature = "svg"))]
    fn render(&mut self, _page_id: &str, _ctx: &mut RenderContext<'_>) -> ViewerResult<RenderStatus> {
        self.drain_incoming();
        Ok(RenderStatus::Waiting)
    }

    fn close(&mut self) {
        self.incoming = None;
        #[cfg(feature = "svg")]
        self.cache.clear();
    }
}
