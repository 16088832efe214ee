pub mod test_helpers {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use image::{DynamicImage, Rgb, RgbImage};

    use crate::pdf::{PageRenderer, RawPage, RenderBackend, RenderError, Result};

    /// Natural page size produced by [`FakeBackend`] unless overridden
    pub const FAKE_PAGE_SIZE: (u32, u32) = (85, 110);

    /// Shared invocation counters of a [`FakeBackend`]
    #[derive(Clone, Debug, Default)]
    pub struct FakeStats {
        opens: Arc<AtomicUsize>,
        renders: Arc<AtomicUsize>,
        live_documents: Arc<AtomicUsize>,
    }

    impl FakeStats {
        /// Number of documents opened so far
        pub fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        /// Number of `render_page` calls so far
        pub fn renders(&self) -> usize {
            self.renders.load(Ordering::SeqCst)
        }

        /// Documents opened and not yet dropped
        pub fn live_documents(&self) -> usize {
            self.live_documents.load(Ordering::SeqCst)
        }
    }

    /// Deterministic in-memory backend for tests.
    ///
    /// The file content decides what gets "opened": a number is the page
    /// count, `corrupt` fails with `CorruptDocument`, anything else gets the
    /// default page count. Each page is a solid color and its text names the
    /// page and the file.
    #[derive(Clone, Debug)]
    pub struct FakeBackend {
        default_pages: usize,
        page_size: (u32, u32),
        render_delay: Option<Duration>,
        failing_page: Option<usize>,
        stats: FakeStats,
    }

    impl FakeBackend {
        pub fn new(default_pages: usize) -> Self {
            Self {
                default_pages,
                page_size: FAKE_PAGE_SIZE,
                render_delay: None,
                failing_page: None,
                stats: FakeStats::default(),
            }
        }

        pub fn with_page_size(mut self, width: u32, height: u32) -> Self {
            self.page_size = (width, height);
            self
        }

        /// Sleep inside every render, to widen race windows
        pub fn with_render_delay(mut self, delay: Duration) -> Self {
            self.render_delay = Some(delay);
            self
        }

        /// Fail renders of `page` with `ProcessFailed`
        pub fn failing_on(mut self, page: usize) -> Self {
            self.failing_page = Some(page);
            self
        }

        pub fn stats(&self) -> FakeStats {
            self.stats.clone()
        }
    }

    impl RenderBackend for FakeBackend {
        fn open(&self, path: &Path) -> Result<Box<dyn PageRenderer>> {
            let content = std::fs::read_to_string(path)
                .map_err(|e| RenderError::io(format!("reading {}", path.display()), e))?;
            let content = content.trim();

            if content == "corrupt" {
                return Err(RenderError::corrupt(format!(
                    "{}: no objects found",
                    path.display()
                )));
            }

            let page_count = content.parse().unwrap_or(self.default_pages);
            self.stats.opens.fetch_add(1, Ordering::SeqCst);
            self.stats.live_documents.fetch_add(1, Ordering::SeqCst);

            Ok(Box::new(FakeDocument {
                path: path.to_path_buf(),
                page_count,
                backend: self.clone(),
            }))
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    struct FakeDocument {
        path: PathBuf,
        page_count: usize,
        backend: FakeBackend,
    }

    impl PageRenderer for FakeDocument {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn render_page(&self, page: usize) -> Result<RawPage> {
            self.backend.stats.renders.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.backend.render_delay {
                std::thread::sleep(delay);
            }

            if self.backend.failing_page == Some(page) {
                return Err(RenderError::ProcessFailed {
                    status: "exit status: 1".to_string(),
                    output: format!("cannot render page {page}"),
                });
            }

            let (width, height) = self.backend.page_size;
            let shade = (page * 40 % 256) as u8;
            let image = RgbImage::from_pixel(width, height, Rgb([shade, 255 - shade, 128]));
            let name = self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            Ok(RawPage {
                image: DynamicImage::ImageRgb8(image),
                text: format!("Page {page} of {name}"),
            })
        }
    }

    impl Drop for FakeDocument {
        fn drop(&mut self) {
            self.backend
                .stats
                .live_documents
                .fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Write a fake document whose content is `content`
    pub fn write_document(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).expect("write fake document");
        path
    }
}
