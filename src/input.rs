//! Input events consumed by the viewer
//!
//! The GUI toolkit translates its native events into [`InputEvent`] and hands
//! them to the viewer once per event, before the frame is drawn.

use std::time::Instant;

use crate::geometry::{Point, Size};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Other(u8),
}

impl MouseButton {
    /// Toolkit button id (1 = left, 2 = middle, 3 = right)
    pub fn id(self) -> u8 {
        match self {
            Self::Left => 1,
            Self::Middle => 2,
            Self::Right => 3,
            Self::Other(id) => id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Escape,
    Char(char),
}

/// Keys that step forward through pages
pub const NEXT_KEYS: &[Key] = &[Key::Right, Key::PageDown];
/// Keys that step backward through pages
pub const PREVIOUS_KEYS: &[Key] = &[Key::Left, Key::PageUp];

impl Key {
    pub fn is_next(self) -> bool {
        NEXT_KEYS.contains(&self)
    }

    pub fn is_previous(self) -> bool {
        PREVIOUS_KEYS.contains(&self)
    }

    pub fn is_navigation(self) -> bool {
        self.is_next() || self.is_previous()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
        alt: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        shift: false,
        alt: false,
    };
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PointerMoved { pos: Point },
    PointerDown { button: MouseButton, pos: Point },
    PointerUp { button: MouseButton, pos: Point },
    KeyDown(Key),
    KeyUp(Key),
    /// Signed wheel delta, positive away from the user
    Wheel { dx: f32, dy: f32 },
    Resize { width: u32, height: u32 },
    Quit,
}

impl InputEvent {
    pub fn key_down(&self, key: Key) -> bool {
        matches!(self, Self::KeyDown(k) if *k == key)
    }
}

/// Per-frame state supplied by the frame loop
#[derive(Clone, Copy, Debug)]
pub struct FrameContext {
    pub now: Instant,
    /// Seconds since the previous frame
    pub delta_time: f32,
    pub mouse_pos: Point,
    pub modifiers: Modifiers,
    pub size: Size,
}

impl FrameContext {
    pub fn new(now: Instant, size: Size) -> Self {
        Self {
            now,
            delta_time: 0.0,
            mouse_pos: Point::ORIGIN,
            modifiers: Modifiers::NONE,
            size,
        }
    }

    pub fn with_delta(mut self, delta_time: f32) -> Self {
        self.delta_time = delta_time;
        self
    }

    pub fn with_mouse(mut self, pos: Point) -> Self {
        self.mouse_pos = pos;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}
