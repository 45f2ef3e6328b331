use super::message::HighlightMessage;
use crate::kernel::highlight::BufferId;
use crate::kernel::session::{ExternalOutcome, HighlightSession};
use crate::kernel::services::ports::HostTransport;
use ropey::Rope;
use std::io;
use std::sync::mpsc::Sender;
use std::sync::Arc;

pub struct HighlightRuntime<H: HostTransport + 'static> {
    runtime: tokio::runtime::Runtime,
    session: Arc<HighlightSession<H>>,
    tx: Sender<HighlightMessage>,
}

impl<H: HostTransport + 'static> HighlightRuntime<H> {
    pub fn new(session: Arc<HighlightSession<H>>, tx: Sender<HighlightMessage>) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .or_else(|e| {
                tracing::error!(
                    error = %e,
                    "Failed to create multi-thread tokio runtime, falling back to current-thread"
                );
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
            })?;
        Ok(Self {
            runtime,
            session,
            tx,
        })
    }

    pub fn tokio_handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }

    pub fn session(&self) -> &Arc<HighlightSession<H>> {
        &self.session
    }

    /// Queue a worker pass for `buffer`. Exactly one message is sent per call.
    pub fn highlight_external(&self, buffer: BufferId, content: Rope) {
        let tx = self.tx.clone();
        let session = self.session.clone();
        self.runtime.spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                session.highlight_external(buffer, &content)
            })
            .await;

            let msg = match result {
                Ok(Ok(ExternalOutcome::Flushed(ops))) => HighlightMessage::Flushed { buffer, ops },
                Ok(Ok(ExternalOutcome::Dropped)) => HighlightMessage::Dropped { buffer },
                Ok(Err(e)) => {
                    tracing::warn!(buffer = %buffer, error = %e, "external highlight failed");
                    HighlightMessage::Failed {
                        buffer,
                        error: e.to_string(),
                    }
                }
                Err(e) => HighlightMessage::Failed {
                    buffer,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(msg);
        });
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/runtime/runtime.rs"]
mod tests;
