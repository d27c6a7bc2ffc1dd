use anyhow::Result;
use std::time::Duration;

use crate::geometry::Point;
pub use crate::input::{InputEvent, Key, MouseButton};

/// Trait for abstracting event sources to enable headless runs and testing
pub trait EventSource {
    /// Poll for events with a timeout
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    /// Read the next event
    fn read(&mut self) -> Result<InputEvent>;
}

/// Simulated event source for scripted sessions
pub struct SimulatedEventSource {
    pub(crate) events: Vec<InputEvent>,
    current_index: usize,
}

impl SimulatedEventSource {
    pub fn new(events: Vec<InputEvent>) -> Self {
        Self {
            events,
            current_index: 0,
        }
    }

    /// Key press followed by release
    pub fn tap(key: Key) -> [InputEvent; 2] {
        [InputEvent::KeyDown(key), InputEvent::KeyUp(key)]
    }

    pub fn click(x: i32, y: i32) -> [InputEvent; 2] {
        let pos = Point::new(x, y);
        [
            InputEvent::PointerDown {
                button: MouseButton::Left,
                pos,
            },
            InputEvent::PointerUp {
                button: MouseButton::Left,
                pos,
            },
        ]
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.current_index < self.events.len())
    }

    fn read(&mut self) -> Result<InputEvent> {
        if self.current_index < self.events.len() {
            let event = self.events[self.current_index].clone();
            self.current_index += 1;
            Ok(event)
        } else {
            // Exhausted scripts end the session
            Ok(InputEvent::Quit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_source_drains_then_quits() {
        let mut source = SimulatedEventSource::new(SimulatedEventSource::tap(Key::Right).to_vec());
        assert!(source.poll(Duration::ZERO).unwrap());
        assert_eq!(source.read().unwrap(), InputEvent::KeyDown(Key::Right));
        assert_eq!(source.read().unwrap(), InputEvent::KeyUp(Key::Right));
        assert!(!source.poll(Duration::ZERO).unwrap());
        assert_eq!(source.read().unwrap(), InputEvent::Quit);
    }
}
