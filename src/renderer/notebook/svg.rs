//! Ink pages rasterized with resvg

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::{ImageBuffer, RgbaImage};
use log::{debug, warn};
use lru::LruCache;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;

use super::expanded::{ExpandedNotebook, Frame, NotebookSizeTracker};
use crate::geometry::{Point, Rect};

/// Tiles kept across every page of the document
const TILE_CACHE_CAPACITY: usize = 12;
/// Parsed pages kept around the one on screen
const PAGE_CACHE_CAPACITY: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TileKey {
    page_id: String,
    x: i32,
    y: i32,
    scale_millis: u32,
}

/// One notebook page's ink
pub struct SvgNotebook {
    tree: usvg::Tree,
    tracker: NotebookSizeTracker,
}

impl SvgNotebook {
    pub fn parse(svg: &[u8], tracker: NotebookSizeTracker) -> Option<Self> {
        let tree = match usvg::Tree::from_data(svg, &usvg::Options::default()) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Failed to parse ink SVG: {e}");
                return None;
            }
        };
        Some(Self { tree, tracker })
    }

    /// Rasterize the frame whose top-left document corner is `origin`
    fn rasterize(&self, origin: Point, scale: f32) -> RgbaImage {
        let width = ((self.tracker.frame_width as f32 * scale).round() as u32).max(1);
        let height = ((self.tracker.frame_height as f32 * scale).round() as u32).max(1);
        let Some(mut pixmap) = Pixmap::new(width, height) else {
            return RgbaImage::new(width, height);
        };

        // SVG user units map onto the initial frame's width
        let svg_width = self.tree.size().width();
        let fit = if svg_width > 0.0 {
            self.tracker.frame_width as f32 / svg_width
        } else {
            1.0
        };
        let transform = Transform::from_scale(fit * scale, fit * scale)
            .post_translate(-(origin.x as f32) * scale, -(origin.y as f32) * scale);
        resvg::render(&self.tree, transform, &mut pixmap.as_mut());

        let mut rgba = pixmap.data().to_vec();
        unpremultiply_rgba(&mut rgba);
        ImageBuffer::from_raw(width, height, rgba).unwrap_or_else(|| RgbaImage::new(width, height))
    }
}

/// Parsed pages and rasterized tiles of one document, both LRU-bounded
pub struct InkCache {
    pages: LruCache<String, SvgNotebook>,
    tiles: LruCache<TileKey, Arc<RgbaImage>>,
}

impl InkCache {
    pub fn new() -> Self {
        Self {
            pages: LruCache::new(NonZeroUsize::new(PAGE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)),
            tiles: LruCache::new(NonZeroUsize::new(TILE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn contains_page(&self, page_id: &str) -> bool {
        self.pages.contains(page_id)
    }

    pub fn insert_page(&mut self, page_id: &str, notebook: SvgNotebook) {
        if let Some((evicted, _)) = self.pages.push(page_id.to_string(), notebook) {
            if evicted != page_id {
                debug!("Dropped parsed ink of page {evicted}");
            }
        }
    }

    /// Frames of a cached page overlapping `area`, `None` when the page is not parsed
    pub fn page_frames(&mut self, page_id: &str, scale: f32, area: Rect) -> Option<Vec<Frame>> {
        let notebook = self.pages.get(page_id)?;
        let mut view = PageTiles {
            notebook,
            page_id,
            scale,
            tiles: &mut self.tiles,
        };
        Some(view.get_frames(area))
    }

    pub fn cached_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn cached_tiles(&self) -> usize {
        self.tiles.len()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.tiles.clear();
    }
}

impl Default for InkCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed page tiled through the shared tile cache
struct PageTiles<'a> {
    notebook: &'a SvgNotebook,
    page_id: &'a str,
    /// Raster pixels per document unit
    scale: f32,
    tiles: &'a mut LruCache<TileKey, Arc<RgbaImage>>,
}

impl ExpandedNotebook for PageTiles<'_> {
    fn frame_width(&self) -> u32 {
        self.notebook.tracker.frame_width
    }

    fn frame_height(&self) -> u32 {
        self.notebook.tracker.frame_height
    }

    fn frame_from_initial(&mut self, x: i32, y: i32) -> Frame {
        let key = TileKey {
            page_id: self.page_id.to_string(),
            x,
            y,
            scale_millis: (self.scale * 1000.0).round() as u32,
        };
        let image = match self.tiles.get(&key) {
            Some(image) => Arc::clone(image),
            None => {
                let image = Arc::new(self.notebook.rasterize(Point::new(x, y.saturating_neg()), self.scale));
                self.tiles.put(key, Arc::clone(&image));
                image
            }
        };
        Frame {
            initial: Point::new(x, y),
            size: self.frame_size(),
            image,
        }
    }
}

fn unpremultiply_rgba(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let alpha = px[3];
        if alpha == 0 || alpha == 255 {
            continue;
        }
        let a = u16::from(alpha);
        for channel in &mut px[..3] {
            *channel = ((u16::from(*channel) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INK: &[u8] = br#"<svg xmlns="http://www.w3.org/2000/svg" width="1404" height="1872">
        <rect x="0" y="0" width="100" height="100" fill="black"/>
    </svg>"#;

    fn cache_with(pages: &[&str]) -> InkCache {
        let mut cache = InkCache::new();
        for page in pages {
            cache.insert_page(page, SvgNotebook::parse(INK, NotebookSizeTracker::PORTRAIT).unwrap());
        }
        cache
    }

    #[test]
    fn tiles_are_cached_per_scale() {
        let mut cache = cache_with(&["p0"]);
        let area = Rect::new(0, 0, 100, 100);
        let frames = cache.page_frames("p0", 0.1, area).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].image.dimensions(), (140, 187));
        assert_eq!(cache.cached_tiles(), 1);

        cache.page_frames("p0", 0.1, area);
        assert_eq!(cache.cached_tiles(), 1);

        cache.page_frames("p0", 0.2, area);
        assert_eq!(cache.cached_tiles(), 2);
    }

    #[test]
    fn ink_lands_in_the_initial_frame() {
        let mut cache = cache_with(&["p0"]);
        let frames = cache.page_frames("p0", 0.1, Rect::new(0, 0, 100, 2000)).unwrap();
        assert_eq!(frames.len(), 2);

        let first = frames.iter().find(|frame| frame.grid() == (0, 0)).unwrap();
        assert_eq!(first.image.get_pixel(2, 2)[3], 255);
        assert_eq!(first.image.get_pixel(100, 100)[3], 0);

        let below = frames.iter().find(|frame| frame.grid() == (0, -1)).unwrap();
        assert_eq!(below.image.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn cache_is_bounded_across_pages() {
        let ids: Vec<String> = (0..10).map(|i| format!("p{i}")).collect();
        let mut cache = InkCache::new();
        for id in &ids {
            cache.insert_page(id, SvgNotebook::parse(INK, NotebookSizeTracker::PORTRAIT).unwrap());
            // Two frames per page
            cache.page_frames(id, 0.05, Rect::new(0, 0, 100, 2000)).unwrap();
        }
        assert_eq!(cache.cached_pages(), PAGE_CACHE_CAPACITY);
        assert_eq!(cache.cached_tiles(), TILE_CACHE_CAPACITY);
        assert!(!cache.contains_page("p0"));
        assert!(cache.contains_page("p9"));
        assert!(cache.page_frames("p0", 0.05, Rect::new(0, 0, 10, 10)).is_none());

        cache.clear();
        assert_eq!((cache.cached_pages(), cache.cached_tiles()), (0, 0));
    }

    #[test]
    fn invalid_svg_is_rejected() {
        assert!(SvgNotebook::parse(b"not svg", NotebookSizeTracker::PORTRAIT).is_none());
    }
}
