//! Draw targets
//!
//! Renderers never talk to a windowing toolkit directly; they draw onto a
//! [`Canvas`]. The GUI shell provides one backed by its frame buffer, tests use
//! [`RecordingCanvas`], and headless runs use [`PixelCanvas`].

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::geometry::{Point, Rect, Size};

pub type Color = Rgba<u8>;

pub mod colors {
    use super::Color;
    use image::Rgba;

    pub const BLACK: Color = Rgba([0, 0, 0, 255]);
    pub const WHITE: Color = Rgba([255, 255, 255, 255]);
    pub const RED: Color = Rgba([255, 0, 0, 255]);
    pub const TEXT: Color = Rgba([10, 10, 10, 255]);
    pub const BUTTON_IDLE: Color = Rgba([220, 220, 220, 255]);
    pub const BUTTON_ACTIVE: Color = Rgba([180, 180, 180, 255]);
    /// Debug veil drawn under everything else
    pub const DEBUG_VEIL: Color = Rgba([0, 0, 0, 25]);
}

pub trait Canvas {
    fn size(&self) -> Size;

    fn fill(&mut self, color: Color) {
        let size = self.size();
        self.fill_rect(Rect::new(0, 0, size.width, size.height), color);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn draw_circle(&mut self, center: Point, radius: u32, color: Color);

    /// Draw `image` scaled into `dest`
    fn blit(&mut self, image: &RgbaImage, dest: Rect);

    fn draw_text(&mut self, text: &str, anchor: Point, color: Color);
}

/// A recorded draw call
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    FillRect { rect: Rect, color: Color },
    Circle { center: Point, radius: u32, color: Color },
    Blit { dest: Rect, source: Size },
    Text { text: String, anchor: Point },
}

/// Canvas that only records what was drawn
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    size: Size,
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn circles(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Circle { .. }))
            .count()
    }

    pub fn blits(&self) -> Vec<Rect> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Blit { dest, .. } => Some(*dest),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> Size {
        self.size
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn draw_circle(&mut self, center: Point, radius: u32, color: Color) {
        self.ops.push(DrawOp::Circle {
            center,
            radius,
            color,
        });
    }

    fn blit(&mut self, image: &RgbaImage, dest: Rect) {
        self.ops.push(DrawOp::Blit {
            dest,
            source: Size::new(image.width(), image.height()),
        });
    }

    fn draw_text(&mut self, text: &str, anchor: Point, _color: Color) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            anchor,
        });
    }
}

/// Canvas backed by an RGBA pixel buffer
pub struct PixelCanvas {
    image: RgbaImage,
}

impl PixelCanvas {
    pub fn new(size: Size) -> Self {
        Self {
            image: RgbaImage::from_pixel(size.width, size.height, colors::WHITE),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn resize(&mut self, size: Size) {
        self.image = RgbaImage::from_pixel(size.width, size.height, colors::WHITE);
    }

    fn blend(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x as u32 >= self.image.width() || y as u32 >= self.image.height() {
            return;
        }
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        let alpha = u16::from(color[3]);
        for channel in 0..3 {
            let src = u16::from(color[channel]);
            let dst = u16::from(pixel[channel]);
            pixel[channel] = ((src * alpha + dst * (255 - alpha)) / 255) as u8;
        }
        pixel[3] = 255;
    }
}

impl Canvas for PixelCanvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = rect.right().min(self.image.width() as i32);
        let y1 = rect.bottom().min(self.image.height() as i32);
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }

    fn draw_circle(&mut self, center: Point, radius: u32, color: Color) {
        let r = radius as i32;
        let r2 = r * r;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r2 {
                    self.blend(center.x + dx, center.y + dy, color);
                }
            }
        }
    }

    fn blit(&mut self, image: &RgbaImage, dest: Rect) {
        if dest.width == 0 || dest.height == 0 {
            return;
        }
        if image.width() == dest.width && image.height() == dest.height {
            imageops::overlay(&mut self.image, image, i64::from(dest.x), i64::from(dest.y));
        } else {
            let scaled = imageops::resize(image, dest.width, dest.height, FilterType::Triangle);
            imageops::overlay(&mut self.image, &scaled, i64::from(dest.x), i64::from(dest.y));
        }
    }

    fn draw_text(&mut self, text: &str, anchor: Point, _color: Color) {
        // No font rasterizer in headless mode
        log::trace!("text at {anchor:?}: {text}");
    }
}
