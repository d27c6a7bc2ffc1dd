//! Page navigation with hold-to-repeat

use std::time::{Duration, Instant};

use crate::input::Key;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Clone, Copy, Debug)]
struct Hold {
    direction: Direction,
    next_at: Instant,
}

#[derive(Debug)]
pub struct PageNavigator {
    current: usize,
    page_count: usize,
    hold: Option<Hold>,
}

impl PageNavigator {
    /// Delay before a held key starts repeating
    pub const DELAY: Duration = Duration::from_millis(200);
    /// Interval between repeats once repeating
    pub const SPEED: Duration = Duration::from_millis(100);

    pub fn new(current: usize, page_count: usize) -> Self {
        Self {
            current: current.min(page_count.saturating_sub(1)),
            page_count,
            hold: None,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn can_do_next(&self) -> bool {
        self.current + 1 < self.page_count
    }

    pub fn can_do_previous(&self) -> bool {
        self.current > 0
    }

    pub fn do_next(&mut self) {
        if self.can_do_next() {
            self.current += 1;
        }
    }

    pub fn do_previous(&mut self) {
        if self.can_do_previous() {
            self.current -= 1;
        }
    }

    fn step(&mut self, direction: Direction) {
        match direction {
            Direction::Next => self.do_next(),
            Direction::Previous => self.do_previous(),
        }
    }

    pub fn is_holding(&self) -> bool {
        self.hold.is_some()
    }

    pub fn clear_hold(&mut self) {
        self.hold = None;
    }

    /// A navigation key went down; steps once and arms the repeat timer
    pub fn key_down(&mut self, key: Key, now: Instant) {
        if self.hold.is_some() {
            return;
        }
        let direction = if key.is_next() {
            Direction::Next
        } else if key.is_previous() {
            Direction::Previous
        } else {
            return;
        };
        self.hold = Some(Hold {
            direction,
            next_at: now + Self::DELAY,
        });
        self.step(direction);
    }

    pub fn key_up(&mut self, key: Key) {
        if self.hold.is_some() && key.is_navigation() {
            self.hold = None;
        }
    }

    /// Repeat the held step when its timer has elapsed
    pub fn tick(&mut self, now: Instant) {
        let Some(hold) = self.hold else {
            return;
        };
        if now > hold.next_at {
            self.step(hold.direction);
            self.hold = Some(Hold {
                direction: hold.direction,
                next_at: now + Self::SPEED,
            });
        }
    }
}
