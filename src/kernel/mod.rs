//! Highlighting core: classification, batching, and the session that ties
//! buffers to namespaces and workers.

pub mod highlight;
pub mod services;
pub mod session;

pub use highlight::{BufferId, CallBatch, GroupTable, HighlightOp, KindTag, Language};
pub use session::{BufferInfo, ExternalOutcome, HighlightSession, SessionError};
