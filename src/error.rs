//! Error taxonomy for the viewer core

/// Errors raised while opening, rendering or closing a document
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// Content is flagged not usable and must never reach a renderer
    #[error("Unusable content for document {uuid}")]
    UnusableContent { uuid: String },

    /// Surfaced to the user in place of `UnusableContent`
    #[error("Cannot render document {visible_name}")]
    CannotRenderDocument { uuid: String, visible_name: String },

    /// A configured backend failed to initialize
    #[error("{0}")]
    RenderBackendUnavailable(String),

    /// No renderer matches the content type
    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("Document {0} is not in the registry")]
    DocumentNotFound(String),

    #[error("Registry: {0}")]
    Registry(#[from] anyhow::Error),
}

impl ViewerError {
    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::RenderBackendUnavailable(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// True for errors that only degrade the session to an on-screen message
    pub fn is_displayable(&self) -> bool {
        matches!(
            self,
            Self::RenderBackendUnavailable(_) | Self::UnsupportedFormat(_)
        )
    }
}

pub type ViewerResult<T> = Result<T, ViewerError>;
