pub mod pdf;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use pdf::{ErrorKind, PageRender, RenderError, RenderService, Zoom};
pub use settings::{BackendKind, RenderConfig};
