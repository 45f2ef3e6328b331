//! Host transport that writes each atomic batch as one JSON line.

use std::io::{self, Write};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::kernel::highlight::{BufferId, HighlightOp};
use crate::kernel::services::ports::{HostError, HostTransport};

/// Emits `[[method, [args...]], ...]` per batch and hands out namespace ids
/// from a local counter starting at 1.
pub struct WriterHost<W: Write + Send> {
    out: Mutex<W>,
    next_namespace: AtomicI64,
}

pub type StdoutHost = WriterHost<io::Stdout>;

impl StdoutHost {
    pub fn stdout() -> Self {
        WriterHost::new(io::stdout())
    }
}

impl<W: Write + Send> WriterHost<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            next_namespace: AtomicI64::new(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> HostTransport for WriterHost<W> {
    fn create_namespace(&self, buffer: BufferId) -> Result<i64, HostError> {
        let namespace = self.next_namespace.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(buffer = %buffer, namespace, "namespace created");
        Ok(namespace)
    }

    fn call_atomic(&self, calls: Vec<HighlightOp>) -> Result<(), HostError> {
        let rendered = serde_json::Value::Array(calls.iter().map(HighlightOp::to_call).collect());
        let mut line = serde_json::to_vec(&rendered)
            .map_err(|e| HostError::Rejected(e.to_string()))?;
        line.push(b'\n');

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(&line)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/host.rs"]
mod tests;
