// Export modules for use in tests
pub mod canvas;
pub mod error;
pub mod event_source;
pub mod geometry;
pub mod import;
pub mod input;
pub mod model;
pub mod panic_handler;
pub mod registry;
pub mod renderer;
pub mod settings;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the viewer entry points
pub use error::{ViewerError, ViewerResult};
pub use viewer::{DocumentViewer, ViewerAction, ViewerServices};
