use std::time::Duration;

use deeptime_protocol::WorkerMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("layout worker disconnected")]
    Disconnected,
    #[error("spawning layout worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("layout message codec: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("layout worker failed request {request_id}: {message}")]
    Worker { request_id: u64, message: String },
    #[error("layout request {request_id} timed out after {after:?}")]
    Timeout { request_id: u64, after: Duration },
}

/// Message channel to a layout worker.
///
/// Both calls must return promptly: the coordinator runs on the render
/// thread and never waits on the worker.
pub trait LayoutTransport {
    fn send(&self, message: &WorkerMessage) -> Result<(), TransportError>;

    /// Next message from the worker, or `Ok(None)` if nothing has arrived.
    fn try_recv(&self) -> Result<Option<WorkerMessage>, TransportError>;
}
