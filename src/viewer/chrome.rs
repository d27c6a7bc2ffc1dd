//! Viewer chrome drawn over the document

use crate::canvas::{Canvas, colors};
use crate::geometry::{Point, Rect, Size};

/// Close button pinned to the top-right corner
#[derive(Debug)]
pub struct CloseButton {
    rect: Rect,
    hovered: bool,
}

impl CloseButton {
    pub const WIDTH: u32 = 40;
    pub const HEIGHT: u32 = 30;
    pub const MARGIN: i32 = 10;

    pub fn new(viewport: Size) -> Self {
        let mut button = Self {
            rect: Rect::new(0, 0, Self::WIDTH, Self::HEIGHT),
            hovered: false,
        };
        button.align(viewport);
        button
    }

    /// Re-pin to the top-right corner after a resize
    pub fn align(&mut self, viewport: Size) {
        self.rect.x = viewport.width as i32 - Self::WIDTH as i32 - Self::MARGIN;
        self.rect.y = Self::MARGIN;
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn hover(&mut self, pos: Point) {
        self.hovered = self.rect.contains(pos);
    }

    pub fn hit(&self, pos: Point) -> bool {
        self.rect.contains(pos)
    }

    pub fn draw(&self, canvas: &mut dyn Canvas) {
        let fill = if self.hovered {
            colors::BUTTON_ACTIVE
        } else {
            colors::BUTTON_IDLE
        };
        canvas.fill_rect(self.rect, fill);
        canvas.draw_text("x", self.rect.center(), colors::TEXT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realigns_on_resize() {
        let mut button = CloseButton::new(Size::new(800, 600));
        assert_eq!(button.rect(), Rect::new(750, 10, 40, 30));
        assert!(button.hit(Point::new(760, 20)));

        button.align(Size::new(400, 300));
        assert_eq!(button.rect(), Rect::new(350, 10, 40, 30));
        assert!(!button.hit(Point::new(760, 20)));
    }
}
