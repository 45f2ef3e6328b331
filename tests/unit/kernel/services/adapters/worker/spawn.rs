use super::*;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

fn is_cloexec(fd: &OwnedFd) -> bool {
    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) };
    assert!(flags >= 0);
    flags & libc::FD_CLOEXEC != 0
}

fn target() -> WorkerTarget {
    WorkerTarget::new(
        BufferId(3),
        PathBuf::from("/src/proj/pkg/main.go"),
        PathBuf::from("/src/proj"),
    )
}

#[test]
fn pipe_pair_marks_both_ends_close_on_exec() {
    let (read, write) = pipe_pair(None).unwrap();
    assert!(is_cloexec(&read));
    assert!(is_cloexec(&write));
}

#[cfg(target_os = "linux")]
#[test]
fn pipe_pair_applies_requested_size() {
    let (read, _write) = pipe_pair(Some(128 * 1024)).unwrap();
    let size = unsafe { libc::fcntl(read.as_raw_fd(), libc::F_GETPIPE_SZ) };
    assert!(size >= 128 * 1024);
}

#[test]
fn target_derives_directory_from_file() {
    let target = target();
    assert_eq!(target.file_dir, PathBuf::from("/src/proj/pkg"));
    assert_eq!(target.buffer, BufferId(3));
}

#[test]
fn args_follow_the_positional_layout() {
    let spec = SpawnSpec {
        binary: Path::new("/usr/bin/worker"),
        invoker_name: "taghl",
        debug: true,
        pipe_buffer_size: None,
    };
    let args: Vec<String> = spec
        .args(&target())
        .into_iter()
        .map(|arg| arg.into_string().unwrap())
        .collect();
    assert_eq!(
        args,
        ["taghl", "1", "/src/proj/pkg/main.go", "/src/proj/pkg", "/src/proj"]
    );

    let quiet = SpawnSpec { debug: false, ..spec };
    assert_eq!(quiet.args(&target())[1], "0");
}

#[test]
fn missing_binary_is_a_recoverable_error() {
    let spec = SpawnSpec {
        binary: Path::new("/nonexistent/taghl-worker"),
        invoker_name: "taghl",
        debug: false,
        pipe_buffer_size: None,
    };
    let err = spawn_worker(&spec, &target()).err().unwrap();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
}

#[test]
fn exited_worker_is_reported_dead() {
    let spec = SpawnSpec {
        binary: Path::new("true"),
        invoker_name: "taghl",
        debug: false,
        pipe_buffer_size: None,
    };
    let mut process = spawn_worker(&spec, &target()).unwrap();
    assert!(process.pid() > 0);

    let deadline = Instant::now() + Duration::from_secs(5);
    while process.is_alive() {
        assert!(Instant::now() < deadline, "worker never exited");
        std::thread::sleep(Duration::from_millis(10));
    }
}
