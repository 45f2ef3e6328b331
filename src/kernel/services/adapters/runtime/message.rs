use crate::kernel::highlight::BufferId;

/// Completion report for a background highlight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightMessage {
    Flushed { buffer: BufferId, ops: usize },
    Dropped { buffer: BufferId },
    Failed { buffer: BufferId, error: String },
}

impl HighlightMessage {
    pub fn buffer(&self) -> BufferId {
        match self {
            HighlightMessage::Flushed { buffer, .. }
            | HighlightMessage::Dropped { buffer }
            | HighlightMessage::Failed { buffer, .. } => *buffer,
        }
    }
}
