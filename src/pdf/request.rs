//! Messages exchanged with native render workers

use flume::Sender;

use super::error::RenderError;
use super::types::RawPage;

/// Unique identifier for render requests, used to correlate log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to render workers
#[derive(Debug)]
pub enum WorkerRequest {
    /// Render a page (0-indexed) and send the result back on `reply`
    Page {
        id: RequestId,
        page_index: usize,
        reply: Sender<Result<RawPage, RenderError>>,
    },

    /// Shutdown the worker
    Shutdown,
}
