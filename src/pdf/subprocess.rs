//! Subprocess renderer: pages are rasterized by an external Ghostscript run
//!
//! The document bytes are read once at load. Every tool run gets its own
//! fresh scratch directory holding a copy of those bytes plus whatever the
//! tool writes; the directory is a [`TempDir`], so it is removed on every
//! exit path, including errors.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat};
use log::debug;
use tempfile::TempDir;

use super::backend::{PageRenderer, RenderBackend};
use super::error::{RenderError, Result};
use super::ghostscript::{Ghostscript, ToolOutput, parse_page_count};
use super::types::RawPage;

const SCRATCH_PREFIX: &str = "pdf-reader-";
const DOCUMENT_FILE: &str = "document.pdf";
const IMAGE_FILE: &str = "page.png";
const TEXT_FILE: &str = "page.txt";

/// Backend rendering through the Ghostscript command-line tool
#[derive(Clone, Debug, Default)]
pub struct SubprocessBackend {
    /// Explicit tool location; the default install path is used when unset
    pub tool_path: Option<PathBuf>,
    /// Kill tool runs exceeding this duration
    pub timeout: Option<Duration>,
    /// Also extract page text (one extra tool run per page)
    pub extract_text: bool,
    /// Directory receiving per-run scratch directories (system temp if unset)
    pub scratch_root: Option<PathBuf>,
}

impl RenderBackend for SubprocessBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn PageRenderer>> {
        let tool = Ghostscript::resolve(self.tool_path.as_deref())?.with_timeout(self.timeout);

        let bytes: Arc<[u8]> = fs::read(path)
            .map_err(|e| RenderError::io(format!("reading {}", path.display()), e))?
            .into();

        let doc = SubprocessDocument {
            tool,
            bytes,
            page_count: 0,
            extract_text: self.extract_text,
            scratch_root: self.scratch_root.clone(),
        };
        let page_count = doc.query_page_count()?;

        Ok(Box::new(SubprocessDocument { page_count, ..doc }))
    }

    fn name(&self) -> &'static str {
        "subprocess"
    }
}

/// A document held in memory and rendered by the external tool
pub struct SubprocessDocument {
    tool: Ghostscript,
    bytes: Arc<[u8]>,
    page_count: usize,
    extract_text: bool,
    scratch_root: Option<PathBuf>,
}

impl SubprocessDocument {
    /// Fresh scratch directory containing a copy of the document
    fn scratch(&self) -> Result<(TempDir, PathBuf)> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| RenderError::io("creating scratch directory", e))?;

        let pdf = dir.path().join(DOCUMENT_FILE);
        fs::write(&pdf, &self.bytes)
            .map_err(|e| RenderError::io("writing scratch copy of document", e))?;

        Ok((dir, pdf))
    }

    fn query_page_count(&self) -> Result<usize> {
        let (scratch, pdf) = self.scratch()?;
        let output = self
            .tool
            .run(&Ghostscript::page_count_args(&pdf, scratch.path()), scratch.path())
            .map_err(|e| match e {
                RenderError::ProcessFailed { output, .. } => RenderError::corrupt(output),
                other => other,
            })?;

        parse_page_count(&output.stdout).ok_or_else(|| {
            RenderError::corrupt(format!(
                "unexpected page count output: {}",
                output.combined()
            ))
        })
    }

    fn rasterize(&self, scratch: &Path, pdf: &Path, page: usize) -> Result<DynamicImage> {
        let out = scratch.join(IMAGE_FILE);
        let run = self
            .tool
            .run(&Ghostscript::render_args(pdf, page, &out), scratch)?;

        let data = read_output(&out, &run)?;
        let image = image::load_from_memory_with_format(&data, ImageFormat::Png).map_err(|e| {
            RenderError::ProcessFailed {
                status: "exit status: 0".to_string(),
                output: format!("unreadable page image: {e}"),
            }
        })?;

        Ok(match image {
            DynamicImage::ImageRgb8(_) => image,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        })
    }

    fn page_text(&self, scratch: &Path, pdf: &Path, page: usize) -> Result<String> {
        if !self.extract_text {
            return Ok(String::new());
        }

        let out = scratch.join(TEXT_FILE);
        let run = self
            .tool
            .run(&Ghostscript::text_args(pdf, page, &out), scratch)?;
        let data = read_output(&out, &run)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

impl PageRenderer for SubprocessDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render_page(&self, page: usize) -> Result<RawPage> {
        let (scratch, pdf) = self.scratch()?;
        debug!("Rendering page {page} in {}", scratch.path().display());

        let image = self.rasterize(scratch.path(), &pdf, page)?;
        let text = self.page_text(scratch.path(), &pdf, page)?;

        Ok(RawPage { image, text })
    }
}

/// Read a file the tool should have produced; a missing file is a tool failure
fn read_output(path: &Path, run: &ToolOutput) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RenderError::ProcessFailed {
            status: "exit status: 0".to_string(),
            output: format!(
                "no output written to {}: {}",
                path.file_name().unwrap_or_default().to_string_lossy(),
                run.combined()
            ),
        },
        _ => RenderError::io(format!("reading {}", path.display()), e),
    })
}
