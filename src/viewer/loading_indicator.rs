//! Animated loading square shown while content loads

use std::time::{Duration, Instant};

use crate::canvas::{Canvas, colors};
use crate::geometry::{Point, Rect, Size};

#[derive(Debug)]
pub struct LoadingIndicator {
    timer: Instant,
}

impl LoadingIndicator {
    pub const DOT_TIME: Duration = Duration::from_millis(400);
    /// Section thresholds at which each dot appears
    const DOT_SECTIONS: [f32; 3] = [0.5, 2.0, 3.0];
    const RESET_SECTION: f32 = 3.5;
    /// Dot x positions as fractions of a third of the square
    const DOT_SPLITS: [f32; 3] = [0.95, 1.5, 2.05];

    pub fn new(now: Instant) -> Self {
        Self { timer: now }
    }

    pub fn square(size: Size) -> Rect {
        let side = (size.width.min(size.height) / 6).max(12);
        Rect::centered_on(
            Point::new((size.width / 2) as i32, (size.height / 2) as i32),
            Size::new(side, side),
        )
    }

    fn section(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.timer).as_secs_f32() / Self::DOT_TIME.as_secs_f32()
    }

    /// Dots visible at `now`
    pub fn dots(&self, now: Instant) -> usize {
        let section = self.section(now);
        Self::DOT_SECTIONS
            .iter()
            .filter(|&&threshold| section > threshold)
            .count()
    }

    /// Draw one frame of the animation, restarting the cycle when it ends
    pub fn draw(&mut self, canvas: &mut dyn Canvas, now: Instant) {
        let square = Self::square(canvas.size());
        canvas.fill_rect(square, colors::BLACK);

        let split = square.width as f32 / 3.0;
        let radius = (square.width / 12).max(1);
        let center_y = square.center().y;
        for split_factor in Self::DOT_SPLITS.iter().take(self.dots(now)) {
            let x = square.x + (split * split_factor) as i32;
            canvas.draw_circle(Point::new(x, center_y), radius, colors::WHITE);
        }

        if self.section(now) > Self::RESET_SECTION {
            self.timer = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;

    #[test]
    fn dots_follow_sections() {
        let start = Instant::now();
        let indicator = LoadingIndicator::new(start);
        let at = |ms| start + Duration::from_millis(ms);
        assert_eq!(indicator.dots(at(100)), 0);
        assert_eq!(indicator.dots(at(250)), 1);
        assert_eq!(indicator.dots(at(820)), 2);
        assert_eq!(indicator.dots(at(1250)), 3);
    }

    #[test]
    fn cycle_restarts_after_three_and_a_half_sections() {
        let start = Instant::now();
        let mut indicator = LoadingIndicator::new(start);
        let mut canvas = RecordingCanvas::new(Size::new(600, 600));

        let late = start + Duration::from_millis(1500);
        indicator.draw(&mut canvas, late);
        assert_eq!(canvas.circles(), 3);

        canvas.clear();
        indicator.draw(&mut canvas, late + Duration::from_millis(100));
        assert_eq!(canvas.circles(), 0);
    }

    #[test]
    fn square_is_centered() {
        let square = LoadingIndicator::square(Size::new(600, 400));
        assert_eq!(square.center(), Point::new(300, 200));
        assert_eq!(square.width, 66);
    }
}
