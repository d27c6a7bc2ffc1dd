//! Screen-space primitives shared by renderers and the viewer

/// Integer pixel position
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Pixel dimensions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned rectangle, origin at the top-left
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of `size` centered on `center`
    #[must_use]
    pub fn centered_on(center: Point, size: Size) -> Self {
        Self::new(
            center.x - (size.width / 2) as i32,
            center.y - (size.height / 2) as i32,
            size.width,
            size.height,
        )
    }

    #[must_use]
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    #[must_use]
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.right() > other.x
            && self.x < other.right()
            && self.bottom() > other.y
            && self.y < other.bottom()
    }

    /// Largest rectangle with `aspect` (width, height) fitting inside, centered
    #[must_use]
    pub fn fit_aspect(&self, aspect: Size) -> Rect {
        if aspect.is_empty() || self.width == 0 || self.height == 0 {
            return *self;
        }
        let scale = (self.width as f32 / aspect.width as f32)
            .min(self.height as f32 / aspect.height as f32);
        let size = Size::new(
            (aspect.width as f32 * scale).round() as u32,
            (aspect.height as f32 * scale).round() as u32,
        );
        Rect::centered_on(self.center(), size)
    }
}
