//! Newline-delimited frame codec.

use std::cmp;
use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Default upper bound for one frame (16 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Splits a byte stream into newline-terminated frames.
///
/// Partial reads are buffered until the delimiter arrives. A trailing `\r`
/// is stripped and blank lines are skipped. A frame longer than the maximum
/// is dropped up to its delimiter and decoding resumes with the next frame,
/// so one oversized message never ends the stream.
#[derive(Debug, Clone)]
pub struct LineFrameCodec {
    max_length: usize,
    next_index: usize,
    discarding: bool,
    dropped: u64,
}

impl LineFrameCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            dropped: 0,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Number of oversized frames dropped so far.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    fn finish_frame(mut line: BytesMut) -> Option<Bytes> {
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(line.freeze())
        }
    }
}

impl Default for LineFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineFrameCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        loop {
            let read_to = cmp::min(self.max_length.saturating_add(1), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n')
                .map(|i| i + self.next_index);

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let mut line = buf.split_to(offset + 1);
                    line.truncate(offset);
                    self.next_index = 0;
                    if let Some(frame) = Self::finish_frame(line) {
                        return Ok(Some(frame));
                    }
                }
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                    self.next_index = 0;
                    self.dropped += 1;
                    warn!(
                        max_length = self.max_length,
                        "Dropping frame that exceeds the maximum length"
                    );
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if self.discarding || buf.is_empty() {
            self.discarding = false;
            buf.clear();
            return Ok(None);
        }
        let line = buf.split_to(buf.len());
        Ok(Self::finish_frame(line))
    }
}

impl Encoder<Bytes> for LineFrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<(), io::Error> {
        if frame.contains(&b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame contains the newline delimiter",
            ));
        }
        if frame.len() > self.max_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {} bytes exceeds the maximum length", frame.len()),
            ));
        }
        dst.reserve(frame.len() + 1);
        dst.put(frame);
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut LineFrameCodec, buf: &mut BytesMut) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_partial_reads_are_buffered() {
        let mut codec = LineFrameCodec::new();
        let mut buf = BytesMut::from(&b"{\"jsonrpc\":"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\"2.0\"}\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"{\"jsonrpc\":\"2.0\"}");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_several_frames_in_one_read() {
        let mut codec = LineFrameCodec::new();
        let mut buf = BytesMut::from(&b"one\ntwo\nthr"[..]);
        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames, vec![Bytes::from("one"), Bytes::from("two")]);
        assert_eq!(&buf[..], b"thr");
    }

    #[test]
    fn test_strips_carriage_return_and_skips_blank_lines() {
        let mut codec = LineFrameCodec::new();
        let mut buf = BytesMut::from(&b"\n  \r\nframe\r\n\n"[..]);
        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames, vec![Bytes::from("frame")]);
    }

    #[test]
    fn test_oversized_frame_is_dropped_and_decoding_resumes() {
        let mut codec = LineFrameCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"0123456789abcdef"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.dropped_frames(), 1);

        buf.extend_from_slice(b"tail\nok\n");
        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames, vec![Bytes::from("ok")]);
    }

    #[test]
    fn test_frame_at_max_length_is_kept() {
        let mut codec = LineFrameCodec::with_max_length(4);
        let mut buf = BytesMut::from(&b"abcd\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Bytes::from("abcd")));
    }

    #[test]
    fn test_eof_yields_unterminated_frame() {
        let mut codec = LineFrameCodec::new();
        let mut buf = BytesMut::from(&b"last"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(Bytes::from("last")));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_encode_appends_delimiter() {
        let mut codec = LineFrameCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(Bytes::from("{}"), &mut dst).unwrap();
        assert_eq!(&dst[..], b"{}\n");
    }

    #[test]
    fn test_encode_rejects_embedded_newline() {
        let mut codec = LineFrameCodec::new();
        let mut dst = BytesMut::new();
        let err = codec.encode(Bytes::from("a\nb"), &mut dst).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(dst.is_empty());
    }
}
