//! Token classification and highlight batching.

pub mod batch;
pub mod classify;
pub mod group_table;

pub use batch::{BufferId, CallBatch, HighlightOp, LineSpan, INITIAL_CAPACITY, TO_END_OF_BUFFER};
pub use classify::{classify_tokens, Classification, Classifier, MAX_RESOLVE_ATTEMPTS};
pub use group_table::{GroupTable, IgnoreList, KindTag, Language};
