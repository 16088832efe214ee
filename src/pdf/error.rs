//! Error taxonomy for document loading and page rendering

use std::path::PathBuf;

/// Category of a [`RenderError`], for callers that only need to branch on the
/// kind of failure (bad request vs. broken tool vs. broken document).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    ToolMissing,
    CorruptDocument,
    OutOfRange,
    ProcessFailed,
    Io,
    Engine,
}

/// Errors produced while loading a document or rendering one of its pages
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("document not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("renderer tool not found at {}", path.display())]
    ToolMissing { path: PathBuf },

    #[error("cannot open document: {detail}")]
    CorruptDocument { detail: String },

    /// `page_count == 0` means no document is loaded.
    #[error("page {page} is out of range (document has {page_count} pages)")]
    OutOfRange { page: usize, page_count: usize },

    #[error("renderer process failed ({status}): {output}")]
    ProcessFailed { status: String, output: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF engine: {detail}")]
    Engine { detail: String },
}

impl RenderError {
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptDocument {
            detail: detail.into(),
        }
    }

    pub fn engine(detail: impl Into<String>) -> Self {
        Self::Engine {
            detail: detail.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ToolMissing { .. } => ErrorKind::ToolMissing,
            Self::CorruptDocument { .. } => ErrorKind::CorruptDocument,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::ProcessFailed { .. } => ErrorKind::ProcessFailed,
            Self::Io { .. } => ErrorKind::Io,
            Self::Engine { .. } => ErrorKind::Engine,
        }
    }
}

#[cfg(feature = "native")]
impl From<mupdf::error::Error> for RenderError {
    fn from(err: mupdf::error::Error) -> Self {
        Self::engine(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
