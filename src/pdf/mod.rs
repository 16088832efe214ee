//! PDF rendering infrastructure

mod backend;
mod cache;
mod error;
mod ghostscript;
#[cfg(feature = "native")]
mod request;
mod scale;
mod service;
mod session;
mod subprocess;
mod types;
#[cfg(feature = "native")]
mod worker;
mod zoom;

pub use backend::{PageRenderer, RENDER_DPI, RenderBackend, render_scale};
pub use cache::{CacheKey, PageCache};
pub use error::{ErrorKind, RenderError, Result};
pub use ghostscript::{Ghostscript, TOOL_ENV_VAR, ToolOutput, default_candidates, parse_page_count};
#[cfg(feature = "native")]
pub use request::{RequestId, WorkerRequest};
pub use scale::{scale_image, scaled_dimensions};
pub use service::RenderService;
pub use session::DocumentSession;
pub use subprocess::{SubprocessBackend, SubprocessDocument};
pub use types::{PageRender, RawPage};
#[cfg(feature = "native")]
pub use worker::{DEFAULT_WORKERS, NativeBackend, NativeDocument};
pub use zoom::Zoom;
