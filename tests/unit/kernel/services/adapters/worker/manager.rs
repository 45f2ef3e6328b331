use super::*;

fn manager(binary: &str) -> WorkerManager {
    WorkerManager::new(WorkerConfig::new(PathBuf::from(binary)))
}

fn target(buffer: i64) -> WorkerTarget {
    WorkerTarget::new(
        BufferId(buffer),
        PathBuf::from("/tmp/proj/main.go"),
        PathBuf::from("/tmp/proj"),
    )
}

#[test]
fn config_requires_a_binary() {
    let mut settings = WorkerSettings::default();
    assert!(WorkerConfig::from_settings(&settings).is_none());

    settings.binary = Some(PathBuf::from("/opt/worker"));
    settings.read_timeout_ms = 250;
    settings.max_in_flight = 0;
    let config = WorkerConfig::from_settings(&settings).unwrap();
    assert_eq!(config.binary, PathBuf::from("/opt/worker"));
    assert_eq!(config.read_timeout, Duration::from_millis(250));
    assert_eq!(config.max_in_flight, 1);
    assert_eq!(config.invoker_name, "taghl");
}

#[test]
fn zero_read_timeout_falls_back_to_default() {
    let settings = WorkerSettings {
        binary: Some(PathBuf::from("/opt/worker")),
        read_timeout_ms: 0,
        ..WorkerSettings::default()
    };
    let config = WorkerConfig::from_settings(&settings).unwrap();
    assert_eq!(config.read_timeout, Duration::from_millis(5_000));
}

#[test]
fn sixth_concurrent_request_is_dropped() {
    let manager = manager("/nonexistent");
    let buffer = BufferId(1);

    let permits: Vec<_> = (0..5).map(|_| manager.try_admit(buffer)).collect();
    assert!(permits.iter().all(Option::is_some));
    assert!(manager.try_admit(buffer).is_none());
    assert_eq!(manager.in_flight(buffer), 5);

    drop(permits);
    assert_eq!(manager.in_flight(buffer), 0);
    assert!(manager.try_admit(buffer).is_some());
}

#[test]
fn buffers_are_throttled_independently() {
    let manager = manager("/nonexistent");
    let a: Vec<_> = (0..5).filter_map(|_| manager.try_admit(BufferId(1))).collect();
    let b: Vec<_> = (0..5).filter_map(|_| manager.try_admit(BufferId(2))).collect();

    assert_eq!(a.len(), 5);
    assert_eq!(b.len(), 5);
    assert!(manager.try_admit(BufferId(1)).is_none());
    assert!(manager.try_admit(BufferId(2)).is_none());
    assert_eq!(a[0].buffer(), BufferId(1));
}

#[test]
fn concurrent_admission_caps_at_five() {
    let manager = std::sync::Arc::new(manager("/nonexistent"));
    let barrier = std::sync::Arc::new(std::sync::Barrier::new(6));
    let (tx, rx) = std::sync::mpsc::channel();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            let tx = tx.clone();
            std::thread::spawn(move || {
                barrier.wait();
                let permit = manager.try_admit(BufferId(7));
                tx.send(permit.is_some()).unwrap();
                // Hold the permit until every thread has tried.
                std::thread::sleep(Duration::from_millis(100));
                drop(permit);
            })
        })
        .collect();
    drop(tx);

    let admitted = rx.iter().filter(|ok| *ok).count();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(admitted, 5);
}

#[test]
fn unknown_buffer_is_not_started() {
    let manager = manager("/nonexistent");
    assert_eq!(manager.state(BufferId(4)), WorkerState::NotStarted);
    assert_eq!(manager.pid(BufferId(4)), None);
    assert_eq!(manager.in_flight(BufferId(4)), 0);
}

#[test]
fn spawn_failure_is_recoverable_and_backs_off() {
    let manager = manager("/nonexistent/taghl-worker");
    let target = target(1);
    let content = Rope::from_str("package main\n");

    let err = manager.invoke(&target, &content).unwrap_err();
    assert!(matches!(err, WorkerError::Spawn(_)));
    assert_eq!(manager.state(target.buffer), WorkerState::Failed);
    assert_eq!(manager.in_flight(target.buffer), 0);

    let err = manager.invoke(&target, &content).unwrap_err();
    assert!(
        matches!(err, WorkerError::Unavailable { retry_in } if retry_in <= Duration::from_millis(200))
    );
}

#[test]
fn backoff_doubles_and_caps() {
    let mut inner = SlotInner {
        process: None,
        state: WorkerState::Failed,
        restart_attempts: 0,
        restart_backoff_until: None,
    };

    let mut delays = Vec::new();
    for _ in 0..8 {
        let before = Instant::now();
        schedule_restart_backoff(&mut inner);
        let until = inner.restart_backoff_until.unwrap();
        delays.push((until - before).as_millis() as u64);
    }

    assert!(delays[0] >= 200 && delays[0] < 300);
    assert!(delays[1] >= 400 && delays[1] < 500);
    assert!(delays[2] >= 800 && delays[2] < 900);
    assert!(delays[7] >= 5_000 && delays[7] < 5_100);
}

#[test]
fn shutdown_forgets_the_buffer() {
    let manager = manager("/nonexistent");
    let _ = manager.invoke(&target(9), &Rope::from_str("x"));
    assert_eq!(manager.state(BufferId(9)), WorkerState::Failed);

    manager.shutdown_buffer(BufferId(9));
    assert_eq!(manager.state(BufferId(9)), WorkerState::NotStarted);
}
