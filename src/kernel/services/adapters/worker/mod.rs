//! Out-of-process tokenizer: one long-lived worker per buffer, spoken to over
//! a pair of length-framed pipes.

pub mod manager;
pub mod parse;
pub mod spawn;
pub mod wire;

pub use manager::{InFlightPermit, WorkerConfig, WorkerError, WorkerManager, WorkerState};
pub use parse::{parse_worker_output, split_and_sort, WorkerRecord, MAX_IDENT_LEN};
pub use spawn::{WorkerProcess, WorkerTarget};
pub use wire::WireError;
