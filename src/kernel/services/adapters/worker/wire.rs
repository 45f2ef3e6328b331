//! Length-prefixed framing used on the worker pipes.
//!
//! A frame is ten ASCII decimal digits (zero padded) followed by exactly that
//! many payload bytes. There is no terminator and no checksum.

use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

pub const LENGTH_DIGITS: usize = 10;
pub const MAX_FRAME_LEN: u64 = 9_999_999_999;

const INITIAL_READ_RESERVE: u64 = 1 << 20;

#[derive(Debug)]
pub enum WireError {
    Io(io::Error),
    UnexpectedEof { expected: u64, read: u64 },
    InvalidLength(String),
    FrameTooLarge(u64),
    Timeout(Duration),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Io(e) => write!(f, "pipe I/O error: {}", e),
            WireError::UnexpectedEof { expected, read } => write!(
                f,
                "peer closed the pipe after {} of {} bytes",
                read, expected
            ),
            WireError::InvalidLength(raw) => write!(f, "invalid frame length field: {:?}", raw),
            WireError::FrameTooLarge(len) => {
                write!(f, "frame of {} bytes exceeds the {} byte limit", len, MAX_FRAME_LEN)
            }
            WireError::Timeout(after) => write!(f, "no data from peer within {:?}", after),
        }
    }
}

impl std::error::Error for WireError {}

impl From<io::Error> for WireError {
    fn from(e: io::Error) -> Self {
        WireError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, WireError>;

pub fn encode_length(len: u64) -> Result<[u8; LENGTH_DIGITS]> {
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len));
    }

    let mut out = [b'0'; LENGTH_DIGITS];
    let mut rest = len;
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    Ok(out)
}

pub fn decode_length(field: &[u8; LENGTH_DIGITS]) -> Result<u64> {
    if !field.iter().all(u8::is_ascii_digit) {
        return Err(WireError::InvalidLength(
            String::from_utf8_lossy(field).into_owned(),
        ));
    }
    Ok(field
        .iter()
        .fold(0u64, |acc, digit| acc * 10 + u64::from(*digit - b'0')))
}

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    write_frame_chunks(writer, payload.len() as u64, std::iter::once(payload))
}

/// Write a frame whose payload arrives in pieces. `len` must equal the sum of
/// the chunk lengths.
pub fn write_frame_chunks<'a, W, I>(writer: &mut W, len: u64, chunks: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a [u8]>,
{
    writer.write_all(&encode_length(len)?)?;

    let mut written = 0u64;
    for chunk in chunks {
        writer.write_all(chunk)?;
        written += chunk.len() as u64;
    }
    if written != len {
        return Err(WireError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame declared {} bytes but {} were supplied", len, written),
        )));
    }

    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut field = [0u8; LENGTH_DIGITS];
    let got = read_full(reader, &mut field)?;
    if got != LENGTH_DIGITS {
        return Err(WireError::UnexpectedEof {
            expected: LENGTH_DIGITS as u64,
            read: got as u64,
        });
    }

    let len = decode_length(&field)?;
    let mut payload = Vec::with_capacity(len.min(INITIAL_READ_RESERVE) as usize);
    let read = reader
        .by_ref()
        .take(len)
        .read_to_end(&mut payload)
        .map_err(timeout_or_io)?;
    if read as u64 != len {
        return Err(WireError::UnexpectedEof {
            expected: len,
            read: read as u64,
        });
    }

    Ok(payload)
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(timeout_or_io(e)),
        }
    }
    Ok(filled)
}

fn timeout_or_io(e: io::Error) -> WireError {
    if e.kind() == io::ErrorKind::TimedOut {
        if let Some(after) = e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<DeadlineExpired>())
        {
            return WireError::Timeout(after.0);
        }
    }
    WireError::Io(e)
}

#[derive(Debug)]
struct DeadlineExpired(Duration);

impl std::fmt::Display for DeadlineExpired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "read deadline of {:?} expired", self.0)
    }
}

impl std::error::Error for DeadlineExpired {}

/// Blocking reader over a pipe that gives up once `timeout` has elapsed
/// since construction.
pub struct DeadlineReader<'a, R: Read + AsRawFd> {
    inner: &'a mut R,
    timeout: Duration,
    deadline: Instant,
}

impl<'a, R: Read + AsRawFd> DeadlineReader<'a, R> {
    pub fn new(inner: &'a mut R, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    fn wait_readable(&self) -> io::Result<()> {
        loop {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.expired());
            }

            let mut pfd = libc::pollfd {
                fd: self.inner.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let millis = remaining.as_millis().clamp(1, i32::MAX as u128) as libc::c_int;
            // SAFETY: pfd is a valid pollfd for the lifetime of the call.
            let ret = unsafe { libc::poll(&mut pfd, 1, millis) };
            match ret {
                -1 => {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(err);
                }
                0 => continue,
                // Readable, hung up or errored: the read itself reports which.
                _ => return Ok(()),
            }
        }
    }

    fn expired(&self) -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, DeadlineExpired(self.timeout))
    }
}

impl<R: Read + AsRawFd> Read for DeadlineReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.wait_readable()?;
        self.inner.read(buf)
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/worker/wire.rs"]
mod tests;
