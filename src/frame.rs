//! Length-prefixed wire framing.
//!
//! Each record travels as one frame: a four byte big-endian unsigned length
//! followed by exactly that many payload bytes. There is no terminating
//! delimiter; decoding relies solely on the prefix.

use std::io::{self, Read};

/// Number of bytes in the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default maximum payload size (in bytes) accepted on either side of the
/// socket. Peers announcing a larger frame are disconnected.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1 << 20; // 1 MiB

/// Frame the payload with a big-endian length prefix.
///
/// Returns `None` when the payload exceeds `max_len`, leaving the caller to
/// drop the record rather than flood the collector.
pub fn encode(payload: &[u8], max_len: usize) -> Option<Vec<u8>> {
    if payload.len() > max_len {
        return None;
    }
    let len = u32::try_from(payload.len()).ok()?;
    let mut framed = Vec::with_capacity(payload.len() + LENGTH_PREFIX_LEN);
    framed.extend(len.to_be_bytes());
    framed.extend_from_slice(payload);
    Some(framed)
}

/// Decode a length prefix into the declared payload size.
pub fn decode_len(prefix: [u8; LENGTH_PREFIX_LEN]) -> u32 {
    u32::from_be_bytes(prefix)
}

/// Failures observed while reading a frame from a stream.
#[derive(Debug)]
pub(crate) enum FrameReadError {
    /// The peer closed the connection cleanly.
    Disconnected,
    /// The peer announced a payload larger than the configured limit.
    Oversized(usize),
    Io(io::Error),
}

/// Read one frame from a non-blocking stream.
///
/// Returns `Ok(None)` when no frame is pending (the prefix read would block).
/// Once any prefix byte has been observed the read is committed: short reads
/// and `WouldBlock` are retried until the declared payload length has been
/// received in full. A zero-byte read before completion is a peer disconnect,
/// not an error to retry. A slow peer can stall the caller inside the
/// committed read; this is a documented limitation of the protocol.
pub(crate) fn read_frame<R: Read>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Vec<u8>>, FrameReadError> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let first = loop {
        match reader.read(&mut prefix) {
            Ok(n) => break n,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameReadError::Io(err)),
        }
    };
    if first == 0 {
        return Err(FrameReadError::Disconnected);
    }
    if first < LENGTH_PREFIX_LEN {
        read_committed(reader, &mut prefix[first..])?;
    }
    let len = decode_len(prefix) as usize;
    if len > max_len {
        return Err(FrameReadError::Oversized(len));
    }
    let mut payload = vec![0u8; len];
    read_committed(reader, &mut payload)?;
    Ok(Some(payload))
}

/// Fill `buf` completely, retrying short reads and `WouldBlock`.
fn read_committed<R: Read>(reader: &mut R, mut buf: &mut [u8]) -> Result<(), FrameReadError> {
    while !buf.is_empty() {
        match reader.read(buf) {
            Ok(0) => return Err(FrameReadError::Disconnected),
            Ok(n) => {
                let filled = buf;
                buf = &mut filled[n..];
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameReadError::Io(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    /// Reader that yields `WouldBlock` at scripted offsets before serving the
    /// remaining bytes one chunk at a time.
    struct StutteringReader {
        data: Vec<u8>,
        pos: usize,
        block_at: Vec<usize>,
    }

    impl Read for StutteringReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(idx) = self.block_at.iter().position(|&at| at == self.pos) {
                self.block_at.remove(idx);
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            let n = buf.len().min(self.data.len() - self.pos).min(3);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[rstest]
    #[case(&b""[..])]
    #[case(&b"x"[..])]
    #[case(&[0xffu8; 255][..])]
    #[case(&[0u8; 4096][..])]
    fn round_trip(#[case] payload: &[u8]) {
        let framed = encode(payload, DEFAULT_MAX_FRAME_LEN).expect("payload within limit");
        assert_eq!(framed.len(), payload.len() + LENGTH_PREFIX_LEN);
        let mut cursor = Cursor::new(framed);
        let decoded = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN)
            .expect("frame reads back")
            .expect("frame pending");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn prefix_is_big_endian() {
        let framed = encode(b"abc", 16).unwrap();
        assert_eq!(&framed[..LENGTH_PREFIX_LEN], &[0, 0, 0, 3]);
        assert_eq!(decode_len([0, 0, 0, 3]), 3);
        assert_eq!(decode_len([1, 0, 0, 0]), 1 << 24);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        assert!(encode(&[0u8; 17], 16).is_none());
        assert!(encode(&[0u8; 16], 16).is_some());
    }

    #[test]
    fn read_rejects_oversized_announcement() {
        let mut framed = encode(&[0u8; 32], 64).unwrap();
        framed.truncate(LENGTH_PREFIX_LEN);
        let mut cursor = Cursor::new(framed);
        match read_frame(&mut cursor, 16) {
            Err(FrameReadError::Oversized(len)) => assert_eq!(len, 32),
            other => panic!("expected oversized error, got {other:?}"),
        }
    }

    #[test]
    fn clean_close_before_prefix_is_disconnect() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(matches!(
            read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN),
            Err(FrameReadError::Disconnected)
        ));
    }

    #[test]
    fn truncated_payload_is_disconnect() {
        let mut framed = encode(b"hello world", DEFAULT_MAX_FRAME_LEN).unwrap();
        framed.truncate(framed.len() - 4);
        let mut cursor = Cursor::new(framed);
        assert!(matches!(
            read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN),
            Err(FrameReadError::Disconnected)
        ));
    }

    #[test]
    fn would_block_before_prefix_means_no_frame_pending() {
        let mut reader = StutteringReader {
            data: encode(b"later", DEFAULT_MAX_FRAME_LEN).unwrap(),
            pos: 0,
            block_at: vec![0],
        };
        assert!(
            read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN)
                .expect("no error")
                .is_none()
        );
    }

    #[test]
    fn committed_read_survives_short_reads_and_blocking() {
        let payload = b"a record split across many short reads";
        let mut reader = StutteringReader {
            data: encode(payload, DEFAULT_MAX_FRAME_LEN).unwrap(),
            pos: 0,
            block_at: vec![3, 9, 21],
        };
        let decoded = read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN)
            .expect("frame reads back")
            .expect("frame pending");
        assert_eq!(decoded, payload);
    }
}
