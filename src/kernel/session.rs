//! Per-session highlight context: attached buffers, their namespaces and
//! group tables, and the worker pool for out-of-process languages.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use ropey::Rope;
use rustc_hash::FxHashMap;

use crate::kernel::highlight::{
    classify_tokens, BufferId, CallBatch, GroupTable, TO_END_OF_BUFFER,
};
use crate::kernel::services::adapters::worker::{
    parse_worker_output, WorkerConfig, WorkerError, WorkerManager, WorkerTarget,
};
use crate::kernel::services::ports::{FrontendToken, HostError, HostTransport, Settings, SyntaxFrontend};

#[derive(Debug)]
pub enum SessionError {
    UnknownBuffer(BufferId),
    UnknownLanguage(String),
    NoWorkerBinary,
    Host(HostError),
    Worker(WorkerError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::UnknownBuffer(id) => write!(f, "buffer {} is not attached", id),
            SessionError::UnknownLanguage(ft) => write!(f, "no highlight profile for filetype {:?}", ft),
            SessionError::NoWorkerBinary => write!(f, "no worker binary configured"),
            SessionError::Host(e) => write!(f, "{}", e),
            SessionError::Worker(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<HostError> for SessionError {
    fn from(e: HostError) -> Self {
        SessionError::Host(e)
    }
}

impl From<WorkerError> for SessionError {
    fn from(e: WorkerError) -> Self {
        SessionError::Worker(e)
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    pub id: BufferId,
    pub filetype: String,
    pub path: PathBuf,
    pub project_root: PathBuf,
}

struct BufferState {
    info: BufferInfo,
    /// Held for a whole highlight pass; survives re-attach.
    namespace: Arc<Mutex<Option<i64>>>,
    table: Arc<GroupTable>,
}

impl BufferState {
    fn lock_pass(&self) -> MutexGuard<'_, Option<i64>> {
        self.namespace.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of one external highlight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalOutcome {
    /// The batch was committed; holds the number of operations sent.
    Flushed(usize),
    /// The buffer already had the maximum number of requests in flight.
    Dropped,
}

pub struct HighlightSession<H: HostTransport> {
    host: H,
    settings: Settings,
    tables: Mutex<FxHashMap<String, Arc<GroupTable>>>,
    buffers: RwLock<FxHashMap<BufferId, Arc<BufferState>>>,
    workers: Option<WorkerManager>,
}

impl<H: HostTransport> HighlightSession<H> {
    pub fn new(host: H, settings: Settings) -> Self {
        let workers = WorkerConfig::from_settings(&settings.worker).map(WorkerManager::new);
        Self {
            host,
            settings,
            tables: Mutex::new(FxHashMap::default()),
            buffers: RwLock::new(FxHashMap::default()),
            workers,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn workers(&self) -> Option<&WorkerManager> {
        self.workers.as_ref()
    }

    fn table_for(&self, filetype: &str) -> Result<Arc<GroupTable>> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = tables.get(filetype) {
            return Ok(table.clone());
        }
        let profile = self
            .settings
            .filetype(filetype)
            .ok_or_else(|| SessionError::UnknownLanguage(filetype.to_string()))?;
        let table = Arc::new(GroupTable::from_settings(profile));
        tables.insert(filetype.to_string(), table.clone());
        Ok(table)
    }

    /// Register a buffer. Re-attaching keeps the namespace already assigned.
    pub fn attach_buffer(&self, info: BufferInfo) -> Result<()> {
        let table = self.table_for(&info.filetype)?;
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        let namespace = buffers
            .get(&info.id)
            .map(|state| state.namespace.clone())
            .unwrap_or_default();

        tracing::debug!(buffer = %info.id, filetype = %info.filetype, "buffer attached");
        buffers.insert(
            info.id,
            Arc::new(BufferState {
                info,
                namespace,
                table,
            }),
        );
        Ok(())
    }

    pub fn detach_buffer(&self, buffer: BufferId) -> Option<BufferInfo> {
        let removed = {
            let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
            buffers.remove(&buffer)
        };
        if let Some(workers) = &self.workers {
            workers.shutdown_buffer(buffer);
        }
        removed.map(|state| state.info.clone())
    }

    pub fn buffer(&self, buffer: BufferId) -> Option<BufferInfo> {
        self.state(buffer).ok().map(|state| state.info.clone())
    }

    /// Namespace assigned to the buffer, if any highlight pass has run.
    pub fn namespace(&self, buffer: BufferId) -> Option<i64> {
        self.state(buffer)
            .ok()
            .and_then(|state| {
                let namespace = *state.lock_pass();
                namespace
            })
    }

    fn state(&self, buffer: BufferId) -> Result<Arc<BufferState>> {
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        buffers
            .get(&buffer)
            .cloned()
            .ok_or(SessionError::UnknownBuffer(buffer))
    }

    /// Start a batch for buffer `id`: allocate the namespace on first use, or
    /// clear the previous pass when one is already assigned. The caller holds
    /// the buffer's pass lock.
    fn begin_batch(&self, id: BufferId, namespace: &mut Option<i64>) -> Result<(CallBatch, i64)> {
        let mut batch = CallBatch::new();

        if let Some(namespace) = *namespace {
            batch.clear_highlight(id, namespace, 0, TO_END_OF_BUFFER);
            return Ok((batch, namespace));
        }

        let created = self.host.create_namespace(id)?;
        tracing::debug!(buffer = %id, namespace = created, "highlight namespace assigned");
        *namespace = Some(created);
        Ok((batch, created))
    }

    /// Classify an in-process token stream and commit it. Returns the number
    /// of operations sent.
    pub fn highlight_tokens<F: SyntaxFrontend>(
        &self,
        buffer: BufferId,
        frontend: &F,
        tokens: &[FrontendToken<F>],
    ) -> Result<usize> {
        let state = self.state(buffer)?;
        let mut pass = state.lock_pass();
        let (mut batch, namespace) = self.begin_batch(buffer, &mut pass)?;

        let added = classify_tokens(frontend, &state.table, tokens, &mut batch, buffer, namespace);
        tracing::debug!(buffer = %buffer, tokens = tokens.len(), added, "classified tokens");

        Ok(batch.flush_atomically(&self.host)?)
    }

    /// Run the buffer's worker over `content` and commit the result.
    ///
    /// The reply is parsed and flushed before the worker lock is released, so
    /// passes reach the host in the order their exchanges ran.
    pub fn highlight_external(&self, buffer: BufferId, content: &Rope) -> Result<ExternalOutcome> {
        let workers = self.workers.as_ref().ok_or(SessionError::NoWorkerBinary)?;
        let state = self.state(buffer)?;
        let target = WorkerTarget::new(
            buffer,
            state.info.path.clone(),
            state.info.project_root.clone(),
        );

        let committed = workers.invoke_with(&target, content, |payload| -> Result<usize> {
            let mut pass = state.lock_pass();
            let (mut batch, namespace) = self.begin_batch(buffer, &mut pass)?;
            let added = parse_worker_output(payload, &state.table, buffer, namespace, &mut batch);
            tracing::debug!(buffer = %buffer, bytes = payload.len(), added, "parsed worker output");
            Ok(batch.flush_atomically(&self.host)?)
        })?;

        match committed {
            Some(sent) => Ok(ExternalOutcome::Flushed(sent?)),
            None => Ok(ExternalOutcome::Dropped),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/session.rs"]
mod tests;
