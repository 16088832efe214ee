//! Core types for PDF rendering

use std::sync::Arc;

use image::DynamicImage;

use super::zoom::Zoom;

/// Output of a renderer backend for one page at its natural resolution
#[derive(Clone)]
pub struct RawPage {
    /// Page raster at the fixed render DPI
    pub image: DynamicImage,
    /// Plain text of the page, empty when the backend does not extract text
    pub text: String,
}

impl std::fmt::Debug for RawPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawPage")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .field("text_len", &self.text.len())
            .finish()
    }
}

/// Complete render result for one (page, zoom) pair.
///
/// Immutable once cached; handed out behind an `Arc`.
#[derive(Clone)]
pub struct PageRender {
    /// Page number (1-based)
    pub page: usize,
    /// Zoom the display image was scaled to
    pub zoom: Zoom,
    /// Render at natural (zoom 1.0) resolution
    pub original: Arc<DynamicImage>,
    /// Display image; shares `original` when zoom is 1.0
    pub image: Arc<DynamicImage>,
    /// Extracted plain text
    pub text: String,
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
}

impl PageRender {
    #[must_use]
    pub fn new(page: usize, zoom: Zoom, original: Arc<DynamicImage>, image: Arc<DynamicImage>, text: String) -> Self {
        let (width, height) = (image.width(), image.height());
        Self {
            page,
            zoom,
            original,
            image,
            text,
            width,
            height,
        }
    }

    /// Natural resolution dimensions
    #[must_use]
    pub fn original_size(&self) -> (u32, u32) {
        (self.original.width(), self.original.height())
    }
}

impl std::fmt::Debug for PageRender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRender")
            .field("page", &self.page)
            .field("zoom", &self.zoom)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("original_size", &self.original_size())
            .field("text_len", &self.text.len())
            .finish_non_exhaustive()
    }
}
