use std::io;
use std::sync::Arc;

use crate::kernel::highlight::{BufferId, HighlightOp};

#[derive(Debug)]
pub enum HostError {
    Io(io::Error),
    Rejected(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::Io(e) => write!(f, "host transport error: {}", e),
            HostError::Rejected(msg) => write!(f, "host rejected call: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

impl From<io::Error> for HostError {
    fn from(e: io::Error) -> Self {
        HostError::Io(e)
    }
}

/// Editor side of the highlight pipeline.
///
/// Implementations own the RPC encoding; this crate only decides which calls
/// are made and in what order.
pub trait HostTransport: Send + Sync {
    /// Allocate a fresh highlight namespace for `buffer`.
    fn create_namespace(&self, buffer: BufferId) -> Result<i64, HostError>;

    /// Apply `calls` as one unit, in order.
    fn call_atomic(&self, calls: Vec<HighlightOp>) -> Result<(), HostError>;
}

impl<T: HostTransport + ?Sized> HostTransport for Arc<T> {
    fn create_namespace(&self, buffer: BufferId) -> Result<i64, HostError> {
        (**self).create_namespace(buffer)
    }

    fn call_atomic(&self, calls: Vec<HighlightOp>) -> Result<(), HostError> {
        (**self).call_atomic(calls)
    }
}
