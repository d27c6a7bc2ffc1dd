pub mod chrome;
pub mod denylist;
pub mod document_renderer;
pub mod loading_indicator;
pub mod navigation;
pub mod session;
pub mod state;
pub mod uploads;
pub mod zoom;

pub use chrome::CloseButton;
pub use denylist::ProblematicDocuments;
pub use document_renderer::{DocumentRenderer, select_primary};
pub use loading_indicator::LoadingIndicator;
pub use navigation::PageNavigator;
pub use session::{CloseOutcome, DocumentViewer, ViewerAction, ViewerServices};
pub use state::{ErrorDisplay, RendererState};
pub use uploads::UploadTracker;
pub use zoom::ZoomState;
