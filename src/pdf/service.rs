//! Render service - document lifecycle plus cached page rendering

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use image::ImageFormat;
use log::debug;

use super::backend::RenderBackend;
use super::cache::{CacheKey, PageCache};
use super::error::{RenderError, Result};
use super::scale::scale_image;
use super::session::DocumentSession;
use super::subprocess::SubprocessBackend;
use super::types::PageRender;
use super::zoom::Zoom;
use crate::settings::{BackendKind, RenderConfig};

#[derive(Default)]
struct ServiceState {
    session: Option<DocumentSession>,
    cache: PageCache,
}

/// Loads one document at a time and serves rendered pages from a cache.
///
/// `load_document` and `close` take the state lock exclusively; page requests
/// share it, so a render never runs against a document that is being
/// replaced.
pub struct RenderService {
    backend: Arc<dyn RenderBackend>,
    state: RwLock<ServiceState>,
}

impl RenderService {
    /// Create a service using the backend selected in `config`
    pub fn new(config: &RenderConfig) -> Result<Self> {
        Ok(Self::with_backend(backend_for(config)?))
    }

    /// Create a service using an explicit backend
    #[must_use]
    pub fn with_backend(backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            backend,
            state: RwLock::new(ServiceState::default()),
        }
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Load the document at `path`, replacing any loaded one.
    ///
    /// The previous document is closed and the cache cleared before the new
    /// one is opened, so a failed load leaves nothing loaded.
    pub fn load_document(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut state = self.write_state();
        Self::reset(&mut state);

        let session = DocumentSession::open(path.as_ref(), self.backend.as_ref())?;
        state.session = Some(session);
        Ok(())
    }

    /// Close the loaded document, if any
    pub fn close(&self) {
        let mut state = self.write_state();
        Self::reset(&mut state);
    }

    /// Page count of the loaded document, 0 when nothing is loaded
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.read_state()
            .session
            .as_ref()
            .map_or(0, DocumentSession::page_count)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.read_state().session.is_some()
    }

    #[must_use]
    pub fn document_path(&self) -> Option<PathBuf> {
        self.read_state()
            .session
            .as_ref()
            .map(|session| session.path().to_path_buf())
    }

    /// Number of (page, zoom) renders currently cached
    #[must_use]
    pub fn cached_pages(&self) -> usize {
        self.read_state().cache.len()
    }

    /// Rendered page `page` (1-based) at `zoom`, from cache when possible
    pub fn get_page(&self, page: usize, zoom: f32) -> Result<Arc<PageRender>> {
        let zoom = Zoom::new(zoom);
        let state = self.read_state();
        let Some(session) = state.session.as_ref() else {
            return Err(RenderError::OutOfRange {
                page,
                page_count: 0,
            });
        };
        session.check_page(page)?;

        state
            .cache
            .get_or_try_insert_with(CacheKey::new(page, zoom), || {
                let raw = session.render_page(page)?;
                let original = Arc::new(raw.image);
                let image = scale_image(&original, zoom);
                Ok(PageRender::new(page, zoom, original, image, raw.text))
            })
    }

    /// Page at its natural resolution, as shown to the assistant
    pub fn render_original(&self, page: usize) -> Result<Arc<PageRender>> {
        self.get_page(page, 1.0)
    }

    /// Natural resolution render of `page` encoded as PNG
    pub fn page_png(&self, page: usize) -> Result<Vec<u8>> {
        let render = self.render_original(page)?;
        let mut png = Cursor::new(Vec::new());
        render
            .original
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| RenderError::engine(format!("encoding page {page} as PNG: {e}")))?;
        debug!("Encoded page {page} as {} bytes of PNG", png.get_ref().len());
        Ok(png.into_inner())
    }

    fn reset(state: &mut ServiceState) {
        // dropping the session logs the close
        state.session = None;
        state.cache.invalidate_all();
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ServiceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ServiceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn backend_for(config: &RenderConfig) -> Result<Arc<dyn RenderBackend>> {
    match config.backend {
        BackendKind::Subprocess => Ok(Arc::new(SubprocessBackend {
            tool_path: config.ghostscript_path.clone(),
            timeout: config.tool_timeout(),
            extract_text: config.extract_text,
            scratch_root: config.scratch_dir.clone(),
        })),
        #[cfg(feature = "native")]
        BackendKind::Native => Ok(Arc::new(super::worker::NativeBackend::new(
            config.native_workers,
        ))),
        #[cfg(not(feature = "native"))]
        BackendKind::Native => Err(RenderError::engine(
            "native rendering is not compiled in (enable the `native` feature)",
        )),
    }
}
