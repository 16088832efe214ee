//! Renderer abstraction shared by the native and subprocess backends

use std::path::Path;

use super::error::Result;
use super::types::RawPage;

/// Resolution every backend renders at
pub const RENDER_DPI: u32 = 300;

/// PDF user space unit (1/72 inch) to pixels at [`RENDER_DPI`]
#[must_use]
pub fn render_scale() -> f32 {
    RENDER_DPI as f32 / 72.0
}

/// Opens documents into a [`PageRenderer`]
pub trait RenderBackend: Send + Sync {
    /// Open the document at `path` (absolute, known to exist)
    fn open(&self, path: &Path) -> Result<Box<dyn PageRenderer>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// An opened document able to render its pages.
///
/// Dropping it releases every resource tied to the document.
pub trait PageRenderer: Send + Sync {
    /// Number of pages, fixed for the renderer's lifetime
    fn page_count(&self) -> usize;

    /// Render `page` (1-based, already bounds-checked) at natural resolution
    fn render_page(&self, page: usize) -> Result<RawPage>;
}
