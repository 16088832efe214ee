//! Open document state

use std::path::{Path, PathBuf};

use log::info;

use super::backend::{PageRenderer, RenderBackend};
use super::error::{RenderError, Result};
use super::types::RawPage;

/// A loaded document: its absolute path, page count and renderer.
///
/// The page count is read once when the document is opened and never
/// re-derived. Dropping the session releases the renderer.
pub struct DocumentSession {
    path: PathBuf,
    page_count: usize,
    renderer: Box<dyn PageRenderer>,
}

impl DocumentSession {
    /// Resolve `path` and open it with `backend`
    pub fn open(path: &Path, backend: &dyn RenderBackend) -> Result<Self> {
        let path = std::path::absolute(path)
            .map_err(|e| RenderError::io(format!("resolving {}", path.display()), e))?;

        if !path.is_file() {
            return Err(RenderError::NotFound { path });
        }

        let renderer = backend.open(&path)?;
        let page_count = renderer.page_count();
        info!(
            "Opened {} with {} backend ({page_count} pages)",
            path.display(),
            backend.name()
        );

        Ok(Self {
            path,
            page_count,
            renderer,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Fail with `OutOfRange` unless `1 <= page <= page_count`
    pub fn check_page(&self, page: usize) -> Result<()> {
        if page == 0 || page > self.page_count {
            return Err(RenderError::OutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(())
    }

    /// Render one page at natural resolution
    pub fn render_page(&self, page: usize) -> Result<RawPage> {
        self.check_page(page)?;
        self.renderer.render_page(page)
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        info!("Closing {}", self.path.display());
    }
}
