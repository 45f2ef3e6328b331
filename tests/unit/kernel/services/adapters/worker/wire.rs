use super::*;
use std::fs::File;
use std::io::Cursor;
use std::os::unix::io::FromRawFd;

fn pipe() -> (File, File) {
    let mut fds = [0 as libc::c_int; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
}

fn round_trip(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_frame(&mut buf, payload).unwrap();
    assert_eq!(buf.len(), LENGTH_DIGITS + payload.len());
    read_frame(&mut Cursor::new(buf)).unwrap()
}

#[test]
fn length_field_is_ten_zero_padded_digits() {
    assert_eq!(&encode_length(0).unwrap(), b"0000000000");
    assert_eq!(&encode_length(42).unwrap(), b"0000000042");
    assert_eq!(&encode_length(MAX_FRAME_LEN).unwrap(), b"9999999999");
    assert_eq!(decode_length(b"0000001234").unwrap(), 1234);
    assert_eq!(decode_length(b"9999999999").unwrap(), MAX_FRAME_LEN);
}

#[test]
fn oversized_frames_are_rejected() {
    assert!(matches!(
        encode_length(MAX_FRAME_LEN + 1),
        Err(WireError::FrameTooLarge(_))
    ));
}

#[test]
fn non_digit_length_is_rejected() {
    let err = decode_length(b"00000x0001").unwrap_err();
    assert!(matches!(err, WireError::InvalidLength(ref raw) if raw == "00000x0001"));

    let err = read_frame(&mut Cursor::new(b"   12345678abc".to_vec())).unwrap_err();
    assert!(matches!(err, WireError::InvalidLength(_)));
}

#[test]
fn empty_and_single_byte_payloads_survive() {
    assert_eq!(round_trip(b""), b"");
    assert_eq!(round_trip(b"x"), b"x");
}

#[test]
fn multi_megabyte_payload_survives() {
    let payload: Vec<u8> = (0..3 * 1024 * 1024 + 17).map(|i| (i % 251) as u8).collect();
    assert_eq!(round_trip(&payload), payload);
}

#[test]
fn chunked_write_matches_single_write() {
    let mut whole = Vec::new();
    write_frame(&mut whole, b"hello world").unwrap();

    let mut chunked = Vec::new();
    let pieces: [&[u8]; 3] = [b"hello", b" ", b"world"];
    write_frame_chunks(&mut chunked, 11, pieces).unwrap();

    assert_eq!(whole, chunked);
}

#[test]
fn chunked_write_with_wrong_length_fails() {
    let mut out = Vec::new();
    let pieces: [&[u8]; 1] = [b"abc"];
    assert!(matches!(
        write_frame_chunks(&mut out, 4, pieces),
        Err(WireError::Io(_))
    ));
}

#[test]
fn closed_stream_before_header_reports_zero_bytes() {
    let err = read_frame(&mut Cursor::new(Vec::new())).unwrap_err();
    assert!(matches!(
        err,
        WireError::UnexpectedEof {
            expected: 10,
            read: 0
        }
    ));

    let err = read_frame(&mut Cursor::new(b"00000".to_vec())).unwrap_err();
    assert!(matches!(err, WireError::UnexpectedEof { read: 5, .. }));
}

#[test]
fn short_payload_is_an_error_not_a_hang() {
    let mut data = b"0000000010".to_vec();
    data.extend_from_slice(b"abc");
    let err = read_frame(&mut Cursor::new(data)).unwrap_err();
    assert!(matches!(
        err,
        WireError::UnexpectedEof {
            expected: 10,
            read: 3
        }
    ));
}

#[test]
fn back_to_back_frames_are_read_in_order() {
    let mut buf = Vec::new();
    write_frame(&mut buf, b"first").unwrap();
    write_frame(&mut buf, b"second").unwrap();

    let mut reader = Cursor::new(buf);
    assert_eq!(read_frame(&mut reader).unwrap(), b"first");
    assert_eq!(read_frame(&mut reader).unwrap(), b"second");
}

#[test]
fn deadline_reader_times_out_on_silent_pipe() {
    let (mut read_end, _write_end) = pipe();

    let started = Instant::now();
    let mut reader = DeadlineReader::new(&mut read_end, Duration::from_millis(50));
    let err = read_frame(&mut reader).unwrap_err();

    assert!(matches!(err, WireError::Timeout(after) if after == Duration::from_millis(50)));
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn deadline_reader_passes_data_through() {
    let (mut read_end, mut write_end) = pipe();

    write_frame(&mut write_end, b"ping").unwrap();
    drop(write_end);

    let mut reader = DeadlineReader::new(&mut read_end, Duration::from_secs(5));
    assert_eq!(read_frame(&mut reader).unwrap(), b"ping");
}
