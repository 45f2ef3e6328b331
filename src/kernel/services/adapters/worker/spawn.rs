//! Worker process launch: pipe plumbing and child supervision.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::os::unix::io::{FromRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, Stdio};

use crate::kernel::highlight::BufferId;

/// Pipe capacity used when the platform maximum cannot be read.
pub const FALLBACK_PIPE_SIZE: usize = 1 << 20;

/// Files a worker is launched for; passed positionally on its command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerTarget {
    pub buffer: BufferId,
    pub file_name: PathBuf,
    pub file_dir: PathBuf,
    pub project_root: PathBuf,
}

impl WorkerTarget {
    pub fn new(buffer: BufferId, file_name: PathBuf, project_root: PathBuf) -> Self {
        let file_dir = file_name
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            buffer,
            file_name,
            file_dir,
            project_root,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpawnSpec<'a> {
    pub binary: &'a Path,
    pub invoker_name: &'a str,
    pub debug: bool,
    pub pipe_buffer_size: Option<usize>,
}

impl SpawnSpec<'_> {
    /// `binary invokerName debugFlag fileName filePath projectRoot`, minus the
    /// leading program path.
    pub fn args(&self, target: &WorkerTarget) -> Vec<std::ffi::OsString> {
        vec![
            self.invoker_name.into(),
            if self.debug { "1" } else { "0" }.into(),
            target.file_name.clone().into_os_string(),
            target.file_dir.clone().into_os_string(),
            target.project_root.clone().into_os_string(),
        ]
    }
}

/// A live worker with both pipe ends owned by the parent.
pub struct WorkerProcess {
    child: Child,
    pid: u32,
    pub(super) reader: File,
    pub(super) writer: File,
}

impl WorkerProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Reap the child if it exited, otherwise send it signal 0.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::warn!(pid = self.pid, status = ?status, "worker exited");
                return false;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "worker wait failed");
                return false;
            }
        }

        // SAFETY: kill with signal 0 only checks for existence and permission.
        let ret = unsafe { libc::kill(self.pid as libc::pid_t, 0) };
        if ret == 0 {
            return true;
        }
        let err = io::Error::last_os_error();
        tracing::warn!(pid = self.pid, error = %err, "worker liveness probe failed");
        err.raw_os_error() == Some(libc::EPERM)
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Create a pipe with both ends close-on-exec, returning `(read, write)`.
pub fn pipe_pair(buffer_size: Option<usize>) -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];
    // SAFETY: fds is a valid 2-element array.
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: both fds were just created by pipe() and are owned by nobody else.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    for fd in [fds[0], fds[1]] {
        // SAFETY: fd is a valid descriptor owned by `read` or `write`.
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            if flags == -1 {
                return Err(io::Error::last_os_error());
            }
            if libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) == -1 {
                return Err(io::Error::last_os_error());
            }
        }
    }

    if let Some(size) = buffer_size {
        // The kernel refuses once the per-user pipe budget is spent; the
        // default capacity still works.
        if let Err(e) = set_pipe_size(fds[0], size) {
            tracing::warn!(size, error = %e, "could not resize worker pipe");
        }
    }

    Ok((read, write))
}

#[cfg(target_os = "linux")]
fn set_pipe_size(fd: RawFd, size: usize) -> io::Result<()> {
    let size = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);
    // SAFETY: fd is a valid pipe descriptor.
    if unsafe { libc::fcntl(fd, libc::F_SETPIPE_SZ, size) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_pipe_size(_fd: RawFd, _size: usize) -> io::Result<()> {
    Ok(())
}

/// Largest pipe capacity an unprivileged process may request.
#[cfg(target_os = "linux")]
pub fn max_pipe_size() -> Option<usize> {
    std::fs::read_to_string("/proc/sys/fs/pipe-max-size")
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .or(Some(FALLBACK_PIPE_SIZE))
}

#[cfg(not(target_os = "linux"))]
pub fn max_pipe_size() -> Option<usize> {
    None
}

pub fn spawn_worker(spec: &SpawnSpec<'_>, target: &WorkerTarget) -> io::Result<WorkerProcess> {
    let (child_stdin, parent_writer) = pipe_pair(spec.pipe_buffer_size)?;
    let (parent_reader, child_stdout) = pipe_pair(spec.pipe_buffer_size)?;

    let mut cmd = Command::new(spec.binary);
    cmd.args(spec.args(target))
        .stdin(Stdio::from(child_stdin))
        .stdout(Stdio::from(child_stdout))
        .stderr(Stdio::piped());

    let spawned = cmd.spawn();
    // The child's pipe ends live inside `cmd`; close them in the parent so
    // end-of-stream is observed when the worker goes away.
    drop(cmd);
    let mut child = spawned?;
    let pid = child.id();

    if let Some(stderr) = child.stderr.take() {
        if let Err(e) = std::thread::Builder::new()
            .name("taghl-worker-stderr".to_string())
            .spawn(move || stderr_loop(pid, stderr))
        {
            tracing::warn!(error = %e, "spawn worker stderr thread failed");
        }
    }

    tracing::info!(
        pid,
        buffer = %target.buffer,
        binary = %spec.binary.display(),
        "worker started"
    );

    Ok(WorkerProcess {
        child,
        pid,
        reader: File::from(parent_reader),
        writer: File::from(parent_writer),
    })
}

fn stderr_loop(pid: u32, stderr: ChildStderr) {
    let reader = BufReader::new(stderr);
    for line in reader.lines() {
        match line {
            Ok(line) => tracing::debug!(pid, "worker stderr: {}", line),
            Err(_) => break,
        }
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/worker/spawn.rs"]
mod tests;
