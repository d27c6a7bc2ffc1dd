//! Zoom and pan state for the document viewer
//!
//! Wheel zoom keeps the point under the cursor stationary by shifting the pan
//! offset against the zoom change. Expensive re-rasterization waits until the
//! wheel has been still for [`ZoomState::ZOOM_WAIT`].

use std::time::{Duration, Instant};

use crate::geometry::{Point, Size};

#[derive(Debug)]
pub struct ZoomState {
    /// Content-intrinsic scale
    pub base_zoom: f32,
    /// User multiplier, always within `[MIN_ZOOM, MAX_ZOOM]`
    user_zoom: f32,
    /// Pan offset in screen pixels
    pub pos: Point,
    /// Size the cursor offset is normalized against
    pub reference_size: Size,
    /// Pan correction per unit of zoom change
    pub scaling_offset: (f32, f32),
    last_zoom: Option<Instant>,
    drag: Option<DragStart>,
}

#[derive(Clone, Copy, Debug)]
struct DragStart {
    mouse: Point,
    pos: Point,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            base_zoom: 1.0,
            user_zoom: 1.0,
            pos: Point::ORIGIN,
            reference_size: Size::new(100, 100),
            scaling_offset: (0.0, 0.0),
            last_zoom: None,
            drag: None,
        }
    }
}

impl ZoomState {
    pub const MIN_ZOOM: f32 = 0.2;
    pub const MAX_ZOOM: f32 = 3.0;
    /// Zoom change per wheel unit per second
    pub const SENSITIVITY: f32 = 10.0;
    pub const ZOOM_WAIT: Duration = Duration::from_millis(200);

    pub fn with_base_zoom(base_zoom: f32) -> Self {
        Self {
            base_zoom: Self::sanitize(base_zoom),
            ..Self::default()
        }
    }

    /// `base_zoom * user_zoom`
    pub fn zoom(&self) -> f32 {
        self.base_zoom * self.user_zoom
    }

    pub fn user_zoom(&self) -> f32 {
        self.user_zoom
    }

    /// Viewport center shifted by the pan offset
    pub fn center(&self, size: Size) -> Point {
        Point::new(
            self.pos.x + (size.width / 2) as i32,
            self.pos.y + (size.height / 2) as i32,
        )
    }

    /// True once the wheel has been idle long enough for full-quality work
    pub fn zoom_ready(&self, now: Instant) -> bool {
        self.last_zoom
            .is_none_or(|last| now.saturating_duration_since(last) > Self::ZOOM_WAIT)
    }

    /// Apply one wheel step; returns whether the zoom changed
    pub fn apply_wheel(&mut self, dy: f32, delta_time: f32, mouse: Point, size: Size, now: Instant) -> bool {
        let zoom_before = self.zoom();
        self.user_zoom = Self::clamp_user_zoom(self.user_zoom + dy * Self::SENSITIVITY * delta_time);
        let zoom_delta = zoom_before - self.zoom();
        if zoom_delta == 0.0 {
            return false;
        }

        let center = self.center(size);
        self.pos = Point::new(
            Self::shifted(
                self.pos.x,
                mouse.x,
                center.x,
                self.reference_size.width,
                self.scaling_offset.0,
                zoom_delta,
            ),
            Self::shifted(
                self.pos.y,
                mouse.y,
                center.y,
                self.reference_size.height,
                self.scaling_offset.1,
                zoom_delta,
            ),
        );
        self.last_zoom = Some(now);
        true
    }

    fn shifted(pos: i32, mouse: i32, center: i32, reference: u32, offset: f32, zoom_delta: f32) -> i32 {
        if reference == 0 {
            return pos;
        }
        let influence = (mouse - center) as f32 / (reference as f32 / 2.0);
        (pos as f32 - influence * offset * zoom_delta).trunc() as i32
    }

    pub fn begin_drag(&mut self, mouse: Point) {
        self.drag = Some(DragStart {
            mouse,
            pos: self.pos,
        });
    }

    pub fn drag_to(&mut self, mouse: Point) {
        if let Some(start) = self.drag {
            self.pos = start.pos.offset(mouse.x - start.mouse.x, mouse.y - start.mouse.y);
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn clamp_user_zoom(zoom: f32) -> f32 {
        if zoom.is_nan() {
            return 1.0;
        }
        zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM)
    }

    fn sanitize(factor: f32) -> f32 {
        if factor.is_finite() && factor > 0.0 {
            factor
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: Size = Size::new(200, 200);

    #[test]
    fn wheel_step_raises_zoom_by_sensitivity() {
        let mut zoom = ZoomState::default();
        let now = Instant::now();
        assert!(zoom.apply_wheel(1.0, 0.016, Point::new(100, 100), SIZE, now));
        assert!((zoom.user_zoom() - 1.16).abs() < 1e-5);
        // No scaling offset: the pan stays put
        assert_eq!(zoom.pos, Point::ORIGIN);
    }

    #[test]
    fn zoom_keeps_cursor_point_with_scaling_offset() {
        let mut zoom = ZoomState {
            scaling_offset: (-50.0, -50.0),
            ..ZoomState::default()
        };
        zoom.apply_wheel(1.0, 0.016, Point::new(150, 100), SIZE, Instant::now());
        // Cursor right of center: the page shifts left to keep it fixed
        assert!((-8..=-7).contains(&zoom.pos.x), "pos {:?}", zoom.pos);
        assert_eq!(zoom.pos.y, 0);
    }

    #[test]
    fn user_zoom_is_clamped() {
        let mut zoom = ZoomState::default();
        let now = Instant::now();
        for _ in 0..100 {
            zoom.apply_wheel(50.0, 0.1, Point::ORIGIN, SIZE, now);
        }
        assert_eq!(zoom.user_zoom(), ZoomState::MAX_ZOOM);
        assert!(!zoom.apply_wheel(1.0, 0.1, Point::ORIGIN, SIZE, now));

        for _ in 0..100 {
            zoom.apply_wheel(-50.0, 0.1, Point::ORIGIN, SIZE, now);
        }
        assert_eq!(zoom.user_zoom(), ZoomState::MIN_ZOOM);
        assert_eq!(ZoomState::clamp_user_zoom(f32::NAN), 1.0);
    }

    #[test]
    fn zoom_ready_after_wait() {
        let mut zoom = ZoomState::default();
        let start = Instant::now();
        assert!(zoom.zoom_ready(start));
        zoom.apply_wheel(1.0, 0.016, Point::ORIGIN, SIZE, start);
        assert!(!zoom.zoom_ready(start + Duration::from_millis(100)));
        assert!(zoom.zoom_ready(start + Duration::from_millis(250)));
    }

    #[test]
    fn drag_moves_pan_by_pointer_delta() {
        let mut zoom = ZoomState::default();
        zoom.begin_drag(Point::new(10, 10));
        zoom.drag_to(Point::new(25, 5));
        assert_eq!(zoom.pos, Point::new(15, -5));
        zoom.end_drag();
        zoom.drag_to(Point::new(100, 100));
        assert_eq!(zoom.pos, Point::new(15, -5));
    }

    #[test]
    fn base_zoom_multiplies() {
        let zoom = ZoomState::with_base_zoom(0.5);
        assert_eq!(zoom.zoom(), 0.5);
        assert_eq!(ZoomState::with_base_zoom(-1.0).zoom(), 1.0);
        assert_eq!(zoom.center(SIZE), Point::new(100, 100));
    }
}
