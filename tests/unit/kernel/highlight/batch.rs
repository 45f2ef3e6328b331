use super::*;
use std::sync::Mutex;

use crate::kernel::services::ports::HostTransport;

#[derive(Default)]
struct RecordingHost {
    calls: Mutex<Vec<Vec<HighlightOp>>>,
}

impl HostTransport for RecordingHost {
    fn create_namespace(&self, _buffer: BufferId) -> Result<i64, HostError> {
        Ok(1)
    }

    fn call_atomic(&self, calls: Vec<HighlightOp>) -> Result<(), HostError> {
        self.calls.lock().unwrap().push(calls);
        Ok(())
    }
}

struct RejectingHost;

impl HostTransport for RejectingHost {
    fn create_namespace(&self, _buffer: BufferId) -> Result<i64, HostError> {
        Ok(1)
    }

    fn call_atomic(&self, _calls: Vec<HighlightOp>) -> Result<(), HostError> {
        Err(HostError::Rejected("busy".to_string()))
    }
}

const BUF: BufferId = BufferId(7);

#[test]
fn new_batch_starts_at_initial_capacity() {
    let batch = CallBatch::new();
    assert!(batch.is_empty());
    assert!(batch.capacity() >= INITIAL_CAPACITY);
}

#[test]
fn growing_past_initial_capacity_preserves_order() {
    let mut batch = CallBatch::new();
    for i in 0..129u32 {
        batch.add_highlight(BUF, 3, "Group", LineSpan::new(i, i, i + 1));
    }

    assert_eq!(batch.len(), 129);
    assert!(batch.capacity() > 129);
    for (i, op) in batch.iter().enumerate() {
        let HighlightOp::Add { line, start_col, .. } = op else {
            panic!("unexpected op {:?}", op);
        };
        assert_eq!(*line, i as i64);
        assert_eq!(*start_col, i as i64);
    }
}

#[test]
fn flush_delivers_every_op_once_in_one_call() {
    let host = RecordingHost::default();
    let mut batch = CallBatch::new();
    batch.clear_highlight(BUF, 3, 0, TO_END_OF_BUFFER);
    for i in 0..200u32 {
        batch.add_highlight(BUF, 3, "Group", LineSpan::new(i, 0, 1));
    }

    let sent = batch.flush_atomically(&host).unwrap();
    assert_eq!(sent, 201);

    let calls = host.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 201);
    assert_eq!(calls[0][0], HighlightOp::clear(BUF, 3, 0, -1));
    assert!(matches!(calls[0][200], HighlightOp::Add { line: 199, .. }));
}

#[test]
fn flush_propagates_host_errors() {
    let mut batch = CallBatch::new();
    batch.add_highlight(BUF, 1, "Group", LineSpan::new(0, 0, 1));
    let err = batch.flush_atomically(&RejectingHost).unwrap_err();
    assert!(matches!(err, HostError::Rejected(_)));
}

#[test]
fn ops_render_as_positional_calls() {
    let add = HighlightOp::add(BUF, 4, "TagHlStruct", LineSpan::new(3, 1, 4));
    assert_eq!(
        add.to_call(),
        serde_json::json!(["nvim_buf_add_highlight", [7, 4, "TagHlStruct", 3, 1, 4]])
    );

    let clear = HighlightOp::clear(BUF, 4, 0, TO_END_OF_BUFFER);
    assert_eq!(
        clear.to_call(),
        serde_json::json!(["nvim_buf_clear_highlight", [7, 4, 0, -1]])
    );
    assert_eq!(clear.namespace(), 4);
}

#[test]
fn to_calls_keeps_emission_order() {
    let mut batch = CallBatch::default();
    batch.clear_highlight(BUF, 2, 0, TO_END_OF_BUFFER);
    batch.add_highlight(BUF, 2, "A", LineSpan::new(0, 0, 1));

    let calls = batch.to_calls();
    let calls = calls.as_array().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0][0], "nvim_buf_clear_highlight");
    assert_eq!(calls[1][0], "nvim_buf_add_highlight");
}
