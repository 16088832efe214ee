//! Native MuPDF renderer - pages are decoded by worker threads
//!
//! MuPDF handles stay on the thread that opened them. Each worker opens its
//! own copy of the document and pulls requests from a shared queue, so a
//! `NativeDocument` can be shared across threads without sharing handles.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use flume::{Receiver, Sender};
use image::{DynamicImage, RgbImage};
use log::{debug, error};
use mupdf::{Colorspace, Document, Matrix, Page, Pixmap, TextPageFlags};

use super::backend::{PageRenderer, RenderBackend, render_scale};
use super::error::{RenderError, Result};
use super::request::{RequestId, WorkerRequest};
use super::types::RawPage;

/// Default number of render worker threads
pub const DEFAULT_WORKERS: usize = 2;

/// Backend rendering in-process with MuPDF
pub struct NativeBackend {
    num_workers: usize,
}

impl NativeBackend {
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
        }
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl RenderBackend for NativeBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn PageRenderer>> {
        let page_count = {
            let doc = open_document(path)?;
            let count = doc
                .page_count()
                .map_err(|e| RenderError::corrupt(format!("{}: {e}", path.display())))?;
            usize::try_from(count).unwrap_or(0)
        };

        Ok(Box::new(NativeDocument::spawn(
            path.to_path_buf(),
            page_count,
            self.num_workers,
        )?))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// An open document served by a pool of render workers
pub struct NativeDocument {
    request_tx: Sender<WorkerRequest>,
    workers: Vec<JoinHandle<()>>,
    page_count: usize,
    next_request_id: AtomicU64,
}

impl NativeDocument {
    fn spawn(doc_path: PathBuf, page_count: usize, num_workers: usize) -> Result<Self> {
        // flume receivers can be cloned, so every worker pulls from one queue.
        let (request_tx, request_rx) = flume::unbounded();

        let mut workers = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let path = doc_path.clone();
            let rx = request_rx.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("pdf-render-{i}"))
                .spawn(move || render_worker(&path, rx));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shutdown_workers(&request_tx, workers);
                    return Err(RenderError::io("spawning render worker", e));
                }
            }
        }

        Ok(Self {
            request_tx,
            workers,
            page_count,
            next_request_id: AtomicU64::new(1),
        })
    }
}

impl PageRenderer for NativeDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render_page(&self, page: usize) -> Result<RawPage> {
        let id = RequestId::new(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        let (reply, response) = flume::bounded(1);

        self.request_tx
            .send(WorkerRequest::Page {
                id,
                page_index: page - 1,
                reply,
            })
            .map_err(|_| RenderError::engine("render workers have shut down"))?;

        response
            .recv()
            .map_err(|_| RenderError::engine(format!("render worker dropped request {}", id.0)))?
    }
}

impl Drop for NativeDocument {
    fn drop(&mut self) {
        shutdown_workers(&self.request_tx, std::mem::take(&mut self.workers));
    }
}

fn shutdown_workers(request_tx: &Sender<WorkerRequest>, workers: Vec<JoinHandle<()>>) {
    for _ in 0..workers.len() {
        let _ = request_tx.send(WorkerRequest::Shutdown);
    }
    for handle in workers {
        let _ = handle.join();
    }
}

fn open_document(path: &Path) -> Result<Document> {
    Document::open(path.to_string_lossy().as_ref())
        .map_err(|e| RenderError::corrupt(format!("{}: {e}", path.display())))
}

/// Main worker function - runs in a dedicated thread
fn render_worker(doc_path: &Path, requests: Receiver<WorkerRequest>) {
    let doc = match open_document(doc_path) {
        Ok(d) => Ok(d),
        Err(e) => {
            error!("Render worker could not open document: {e}");
            Err(e.to_string())
        }
    };

    for request in requests {
        match request {
            WorkerRequest::Page {
                id,
                page_index,
                reply,
            } => {
                debug!("Worker rendering page index {page_index} (request {})", id.0);
                let result = match &doc {
                    Ok(doc) => render_page(doc, page_index),
                    Err(detail) => Err(RenderError::corrupt(detail.clone())),
                };
                let _ = reply.send(result);
            }

            WorkerRequest::Shutdown => break,
        }
    }
}

/// Render a single page at the fixed render DPI
pub fn render_page(doc: &Document, page_index: usize) -> Result<RawPage> {
    let page = doc.load_page(page_index as i32)?;

    let scale = render_scale();
    let transform = Matrix::new_scale(scale, scale);
    let rgb = Colorspace::device_rgb();
    let pixmap = page.to_pixmap(&transform, &rgb, false, false)?;

    let pixels = pixmap_to_rgb(&pixmap)?;
    let image = RgbImage::from_raw(pixmap.width(), pixmap.height(), pixels)
        .ok_or_else(|| RenderError::engine("Pixmap buffer size mismatch"))?;

    Ok(RawPage {
        image: DynamicImage::ImageRgb8(image),
        text: extract_text(&page)?,
    })
}

fn extract_text(page: &Page) -> Result<String> {
    let text_page = page.to_text_page(TextPageFlags::empty())?;
    Ok(text_page.to_text()?)
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RenderError::engine(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    let expected_min = stride.saturating_mul(height);
    if samples.len() < expected_min || row_bytes > stride {
        return Err(RenderError::engine("Pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(out)
}
