use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use ropey::Rope;
use rustc_hash::FxHashMap;

use super::spawn::{max_pipe_size, spawn_worker, SpawnSpec, WorkerProcess, WorkerTarget};
use super::wire::{self, DeadlineReader, WireError};
use crate::kernel::highlight::BufferId;
use crate::kernel::services::ports::WorkerSettings;

const RESTART_BASE_DELAY_MS: u64 = 200;
const RESTART_MAX_DELAY_MS: u64 = 5_000;

#[derive(Debug)]
pub enum WorkerError {
    Spawn(io::Error),
    Protocol(WireError),
    InvalidUtf8,
    Unavailable { retry_in: Duration },
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Spawn(e) => write!(f, "failed to start worker: {}", e),
            WorkerError::Protocol(e) => write!(f, "worker protocol error: {}", e),
            WorkerError::InvalidUtf8 => write!(f, "worker reply is not valid UTF-8"),
            WorkerError::Unavailable { retry_in } => {
                write!(f, "worker restart pending, retry in {:?}", retry_in)
            }
        }
    }
}

impl std::error::Error for WorkerError {}

impl From<WireError> for WorkerError {
    fn from(e: WireError) -> Self {
        WorkerError::Protocol(e)
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    NotStarted,
    Starting,
    Running,
    Restarting,
    Failed,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub binary: PathBuf,
    pub invoker_name: String,
    pub debug: bool,
    pub read_timeout: Duration,
    pub max_in_flight: usize,
    pub pipe_buffer_size: Option<usize>,
}

impl WorkerConfig {
    pub fn new(binary: PathBuf) -> Self {
        Self::from_settings_with_binary(&WorkerSettings::default(), binary)
    }

    /// `None` when no worker binary is configured.
    pub fn from_settings(settings: &WorkerSettings) -> Option<Self> {
        let binary = settings.binary.clone()?;
        Some(Self::from_settings_with_binary(settings, binary))
    }

    fn from_settings_with_binary(settings: &WorkerSettings, binary: PathBuf) -> Self {
        Self {
            binary,
            invoker_name: settings.invoker_name.clone(),
            debug: settings.debug,
            read_timeout: read_timeout(settings.read_timeout_ms),
            max_in_flight: settings.max_in_flight.max(1),
            pipe_buffer_size: settings.pipe_buffer_size.or_else(max_pipe_size),
        }
    }

    fn spawn_spec(&self) -> SpawnSpec<'_> {
        SpawnSpec {
            binary: &self.binary,
            invoker_name: &self.invoker_name,
            debug: self.debug,
            pipe_buffer_size: self.pipe_buffer_size,
        }
    }
}

/// A zero timeout would expire before the first poll; fall back to the
/// default instead.
fn read_timeout(ms: u64) -> Duration {
    if ms == 0 {
        return Duration::from_millis(WorkerSettings::default().read_timeout_ms);
    }
    Duration::from_millis(ms)
}

struct SlotInner {
    process: Option<WorkerProcess>,
    state: WorkerState,
    restart_attempts: u32,
    restart_backoff_until: Option<Instant>,
}

/// Per-buffer worker bookkeeping.
struct WorkerSlot {
    started: AtomicBool,
    in_flight: AtomicUsize,
    inner: Mutex<SlotInner>,
}

impl WorkerSlot {
    fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            inner: Mutex::new(SlotInner {
                process: None,
                state: WorkerState::NotStarted,
                restart_attempts: 0,
                restart_backoff_until: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission ticket for one exchange; releases its slot on drop.
pub struct InFlightPermit {
    buffer: BufferId,
    slot: Arc<WorkerSlot>,
}

impl InFlightPermit {
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.slot.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Owns one out-of-process tokenizer per buffer.
pub struct WorkerManager {
    config: WorkerConfig,
    slots: Mutex<FxHashMap<BufferId, Arc<WorkerSlot>>>,
}

impl WorkerManager {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn slot(&self, buffer: BufferId) -> Arc<WorkerSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(buffer)
            .or_insert_with(|| Arc::new(WorkerSlot::new()))
            .clone()
    }

    fn existing_slot(&self, buffer: BufferId) -> Option<Arc<WorkerSlot>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(&buffer).cloned()
    }

    /// Reserve one of the buffer's concurrent exchange slots, or `None` when
    /// all are taken.
    pub fn try_admit(&self, buffer: BufferId) -> Option<InFlightPermit> {
        let slot = self.slot(buffer);
        let count = slot.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        if count > self.config.max_in_flight {
            slot.in_flight.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!(buffer = %buffer, in_flight = count - 1, "worker request dropped");
            return None;
        }
        Some(InFlightPermit { buffer, slot })
    }

    /// Send `content` to the buffer's worker and return its reply.
    ///
    /// `Ok(None)` means the request was not admitted; nothing was sent.
    pub fn invoke(&self, target: &WorkerTarget, content: &Rope) -> Result<Option<String>> {
        self.invoke_with(target, content, str::to_owned)
    }

    /// Like [`invoke`](Self::invoke), but hands the reply to `on_reply` while
    /// the buffer's lock is still held, so replies are consumed in the order
    /// the exchanges happened.
    pub fn invoke_with<R>(
        &self,
        target: &WorkerTarget,
        content: &Rope,
        on_reply: impl FnOnce(&str) -> R,
    ) -> Result<Option<R>> {
        let Some(permit) = self.try_admit(target.buffer) else {
            return Ok(None);
        };
        self.exchange(&permit, target, content, on_reply).map(Some)
    }

    /// Run one request/response cycle under the buffer's lock.
    pub fn exchange<R>(
        &self,
        permit: &InFlightPermit,
        target: &WorkerTarget,
        content: &Rope,
        on_reply: impl FnOnce(&str) -> R,
    ) -> Result<R> {
        let slot = &permit.slot;
        let mut inner = slot.lock();

        self.ensure_running(slot, &mut inner, target)?;

        let result = match inner.process.as_mut() {
            Some(process) => self.round_trip(process, content),
            None => Err(WorkerError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                "worker process missing after start",
            ))),
        };

        match result {
            Ok(payload) => {
                let payload = String::from_utf8(payload).map_err(|_| WorkerError::InvalidUtf8)?;
                Ok(on_reply(&payload))
            }
            Err(e) => {
                tracing::warn!(buffer = %target.buffer, error = %e, "worker exchange failed");
                // Tear down so the next request respawns.
                inner.process = None;
                inner.state = WorkerState::Restarting;
                Err(e)
            }
        }
    }

    fn round_trip(&self, process: &mut WorkerProcess, content: &Rope) -> Result<Vec<u8>> {
        let len = content.len_bytes() as u64;
        wire::write_frame_chunks(
            &mut process.writer,
            len,
            content.chunks().map(str::as_bytes),
        )?;

        let mut reader = DeadlineReader::new(&mut process.reader, self.config.read_timeout);
        Ok(wire::read_frame(&mut reader)?)
    }

    fn ensure_running(
        &self,
        slot: &WorkerSlot,
        inner: &mut SlotInner,
        target: &WorkerTarget,
    ) -> Result<()> {
        if !slot.started.swap(true, Ordering::AcqRel) {
            inner.state = WorkerState::Starting;
            return self.start(inner, target);
        }

        if let Some(process) = inner.process.as_mut() {
            if process.is_alive() {
                return Ok(());
            }
            tracing::warn!(buffer = %target.buffer, pid = process.pid(), "worker gone, respawning");
            inner.process = None;
            inner.state = WorkerState::Restarting;
        }

        self.start(inner, target)
    }

    fn start(&self, inner: &mut SlotInner, target: &WorkerTarget) -> Result<()> {
        if let Some(until) = inner.restart_backoff_until {
            let now = Instant::now();
            if now < until {
                return Err(WorkerError::Unavailable {
                    retry_in: until - now,
                });
            }
        }

        match spawn_worker(&self.config.spawn_spec(), target) {
            Ok(process) => {
                inner.process = Some(process);
                inner.state = WorkerState::Running;
                inner.restart_attempts = 0;
                inner.restart_backoff_until = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    buffer = %target.buffer,
                    binary = %self.config.binary.display(),
                    error = %e,
                    "spawn worker failed"
                );
                inner.state = WorkerState::Failed;
                schedule_restart_backoff(inner);
                Err(WorkerError::Spawn(e))
            }
        }
    }

    pub fn state(&self, buffer: BufferId) -> WorkerState {
        let Some(slot) = self.existing_slot(buffer) else {
            return WorkerState::NotStarted;
        };
        let state = slot.lock().state;
        state
    }

    pub fn pid(&self, buffer: BufferId) -> Option<u32> {
        let slot = self.existing_slot(buffer)?;
        let inner = slot.lock();
        inner.process.as_ref().map(WorkerProcess::pid)
    }

    pub fn in_flight(&self, buffer: BufferId) -> usize {
        self.existing_slot(buffer)
            .map(|slot| slot.in_flight.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Stop the buffer's worker and forget its state.
    pub fn shutdown_buffer(&self, buffer: BufferId) {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.remove(&buffer)
        };
        if let Some(slot) = slot {
            let mut inner = slot.lock();
            if let Some(process) = inner.process.take() {
                tracing::info!(buffer = %buffer, pid = process.pid(), "stopping worker");
            }
        }
    }
}

fn schedule_restart_backoff(inner: &mut SlotInner) {
    let attempt = inner.restart_attempts.saturating_add(1);
    inner.restart_attempts = attempt;

    let shift = attempt.saturating_sub(1).min(6);
    let delay_ms = RESTART_BASE_DELAY_MS.saturating_mul(1u64 << shift);
    let delay = Duration::from_millis(delay_ms.min(RESTART_MAX_DELAY_MS));
    inner.restart_backoff_until = Some(Instant::now() + delay);
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/worker/manager.rs"]
mod tests;
