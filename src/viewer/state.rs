use crate::canvas::{Canvas, colors};
use crate::geometry::{Point, Size};

/// User-visible error message, anchored at the viewport center
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorDisplay {
    pub message: String,
    pub anchor: Point,
}

impl ErrorDisplay {
    pub fn centered(message: impl Into<String>, size: Size) -> Self {
        Self {
            message: message.into(),
            anchor: Point::new((size.width / 2) as i32, (size.height / 2) as i32),
        }
    }

    pub fn draw(&self, canvas: &mut dyn Canvas) {
        canvas.draw_text(&self.message, self.anchor, colors::TEXT);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RendererState {
    /// Not loaded yet
    NoContent,
    Loading,
    Ready,
    /// Terminal until the viewer is closed
    Error(ErrorDisplay),
    Closed,
}

impl RendererState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoContent => "nocontent",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error(_) => "error",
            Self::Closed => "closed",
        }
    }

    pub fn error(&self) -> Option<&ErrorDisplay> {
        match self {
            Self::Error(display) => Some(display),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
