//! Ordered buffer of highlight calls committed to the host as one atomic unit.

use compact_str::CompactString;
use serde_json::{json, Value};

use crate::kernel::services::ports::host::{HostError, HostTransport};

/// Initial number of call slots; the buffer doubles when it runs out.
pub const INITIAL_CAPACITY: usize = 128;

/// `to_line` value meaning "through the end of the buffer".
pub const TO_END_OF_BUFFER: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub i64);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A highlight range confined to one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub line: u32,
    pub start: u32,
    pub end: u32,
}

impl LineSpan {
    pub fn new(line: u32, start: u32, end: u32) -> Self {
        Self { line, start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightOp {
    Add {
        buffer: BufferId,
        namespace: i64,
        group: CompactString,
        line: i64,
        start_col: i64,
        end_col: i64,
    },
    Clear {
        buffer: BufferId,
        namespace: i64,
        from_line: i64,
        to_line: i64,
    },
}

impl HighlightOp {
    pub fn add(buffer: BufferId, namespace: i64, group: &str, span: LineSpan) -> Self {
        HighlightOp::Add {
            buffer,
            namespace,
            group: CompactString::from(group),
            line: i64::from(span.line),
            start_col: i64::from(span.start),
            end_col: i64::from(span.end),
        }
    }

    pub fn clear(buffer: BufferId, namespace: i64, from_line: i64, to_line: i64) -> Self {
        HighlightOp::Clear {
            buffer,
            namespace,
            from_line,
            to_line,
        }
    }

    /// Remote method name this operation is sent as.
    pub fn method(&self) -> &'static str {
        match self {
            HighlightOp::Add { .. } => "nvim_buf_add_highlight",
            HighlightOp::Clear { .. } => "nvim_buf_clear_highlight",
        }
    }

    pub fn namespace(&self) -> i64 {
        match self {
            HighlightOp::Add { namespace, .. } | HighlightOp::Clear { namespace, .. } => *namespace,
        }
    }

    /// Positional `[method, [args...]]` form of the call.
    pub fn to_call(&self) -> Value {
        match self {
            HighlightOp::Add {
                buffer,
                namespace,
                group,
                line,
                start_col,
                end_col,
            } => json!([
                self.method(),
                [buffer.0, namespace, group.as_str(), line, start_col, end_col]
            ]),
            HighlightOp::Clear {
                buffer,
                namespace,
                from_line,
                to_line,
            } => json!([self.method(), [buffer.0, namespace, from_line, to_line]]),
        }
    }
}

/// Append-only call list owned by a single classification run.
#[derive(Debug)]
pub struct CallBatch {
    ops: Vec<HighlightOp>,
}

impl CallBatch {
    pub fn new() -> Self {
        Self {
            ops: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn push(&mut self, op: HighlightOp) {
        // One slot stays in reserve; grow by doubling before it is consumed.
        let capacity = self.ops.capacity().max(1);
        if self.ops.len() >= capacity - 1 {
            self.ops.reserve_exact(capacity);
        }
        self.ops.push(op);
    }

    pub fn add_highlight(&mut self, buffer: BufferId, namespace: i64, group: &str, span: LineSpan) {
        self.push(HighlightOp::add(buffer, namespace, group, span));
    }

    pub fn clear_highlight(&mut self, buffer: BufferId, namespace: i64, from_line: i64, to_line: i64) {
        self.push(HighlightOp::clear(buffer, namespace, from_line, to_line));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ops.capacity()
    }

    pub fn ops(&self) -> &[HighlightOp] {
        &self.ops
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HighlightOp> {
        self.ops.iter()
    }

    /// Rendered call list, in emission order.
    pub fn to_calls(&self) -> Value {
        Value::Array(self.ops.iter().map(HighlightOp::to_call).collect())
    }

    /// Hand every operation to the host in one atomic call. The batch is
    /// consumed either way.
    pub fn flush_atomically<H>(self, host: &H) -> Result<usize, HostError>
    where
        H: HostTransport + ?Sized,
    {
        let count = self.ops.len();
        host.call_atomic(self.ops)?;
        Ok(count)
    }
}

impl Default for CallBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoIterator for CallBatch {
    type Item = HighlightOp;
    type IntoIter = std::vec::IntoIter<HighlightOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/highlight/batch.rs"]
mod tests;
