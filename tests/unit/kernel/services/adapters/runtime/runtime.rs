use super::*;
use crate::kernel::session::BufferInfo;
use crate::kernel::services::adapters::host::WriterHost;
use crate::kernel::services::ports::Settings;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

fn session(binary: Option<&str>) -> Arc<HighlightSession<WriterHost<Vec<u8>>>> {
    let mut settings = Settings::default();
    settings.worker.binary = binary.map(PathBuf::from);
    let session = HighlightSession::new(WriterHost::new(Vec::new()), settings);
    session
        .attach_buffer(BufferInfo {
            id: BufferId(1),
            filetype: "go".to_string(),
            path: PathBuf::from("/tmp/main.go"),
            project_root: PathBuf::from("/tmp"),
        })
        .unwrap();
    Arc::new(session)
}

#[test]
fn failed_request_is_reported_once() {
    let (tx, rx) = mpsc::channel();
    let runtime = HighlightRuntime::new(session(Some("/nonexistent/worker")), tx).unwrap();

    runtime.highlight_external(BufferId(1), Rope::from_str("package main\n"));

    let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(msg.buffer(), BufferId(1));
    assert!(matches!(msg, HighlightMessage::Failed { .. }));
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn missing_worker_binary_fails_without_spawning() {
    let (tx, rx) = mpsc::channel();
    let runtime = HighlightRuntime::new(session(None), tx).unwrap();

    runtime.highlight_external(BufferId(1), Rope::new());

    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        HighlightMessage::Failed { error, .. } => assert!(error.contains("no worker binary")),
        other => panic!("unexpected message {:?}", other),
    }
    assert!(runtime.session().workers().is_none());
}

#[test]
fn unknown_buffer_is_a_failure() {
    let (tx, rx) = mpsc::channel();
    let runtime = HighlightRuntime::new(session(Some("/nonexistent/worker")), tx).unwrap();

    runtime.highlight_external(BufferId(99), Rope::new());

    let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(msg, HighlightMessage::Failed { buffer: BufferId(99), .. }));
}
