//! Line framing
//!
//! Turns the raw byte stream from the controller into discrete lines.
//! `\r` closes a line, `\n` is ignored, and empty lines are dropped.
//! State is carried across chunk boundaries, so a line may span any number
//! of reads.

use std::collections::VecDeque;
use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{Command, LINE_TERMINATOR};

/// Receive buffer and line splitter for the serial link
///
/// There is no upper bound on line length; the link is a trusted local one.
#[derive(Debug, Default)]
pub struct LineFramer {
    /// Bytes of the line currently being received
    partial: Vec<u8>,
    /// Complete lines not yet handed out by the decoder
    ready: VecDeque<String>,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            match byte {
                b'\n' => {}
                LINE_TERMINATOR => {
                    if !self.partial.is_empty() {
                        lines.push(String::from_utf8_lossy(&self.partial).into_owned());
                        self.partial.clear();
                    }
                }
                other => self.partial.push(other),
            }
        }
        lines
    }

    /// Bytes of the incomplete line received so far
    pub fn pending(&self) -> &[u8] {
        &self.partial
    }

    /// Discard the partial line and any undelivered lines
    pub fn reset(&mut self) {
        self.partial.clear();
        self.ready.clear();
    }
}

impl Decoder for LineFramer {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !src.is_empty() {
            let chunk = src.split();
            let lines = self.push(&chunk);
            self.ready.extend(lines);
        }
        Ok(self.ready.pop_front())
    }
}

impl Encoder<Command> for LineFramer {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.as_str().len() + 1);
        dst.put_slice(item.as_str().as_bytes());
        dst.put_u8(LINE_TERMINATOR);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_line() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"V2.0\r\n"), vec!["V2.0".to_string()]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_empty_lines_dropped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"\r\r\n\rOK\r\r"), vec!["OK".to_string()]);
    }

    #[test]
    fn test_line_spans_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"U 3.7").is_empty());
        assert_eq!(framer.pending(), b"U 3.7");
        assert_eq!(framer.push(b"0 1\r"), vec!["U 3.70 1".to_string()]);
    }

    #[test]
    fn test_chunk_boundary_independence() {
        let stream: &[u8] = b"V2.0\r\n{\"ID\":1}\r\n\r\n U: x\r}\rtCalOffset: -3\r";
        let mut whole = LineFramer::new();
        let expected = whole.push(stream);
        assert_eq!(expected.len(), 5);

        for split in 1..stream.len() {
            let mut framer = LineFramer::new();
            let mut lines = framer.push(&stream[..split]);
            lines.extend(framer.push(&stream[split..]));
            assert_eq!(lines, expected, "split at {}", split);
        }

        let mut framer = LineFramer::new();
        let lines: Vec<String> = stream.iter().flat_map(|b| framer.push(&[*b])).collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_reset_discards_partial() {
        let mut framer = LineFramer::new();
        framer.push(b"{\"ID\":1,\"Mo");
        framer.reset();
        assert_eq!(framer.push(b"OK\r"), vec!["OK".to_string()]);
    }

    #[test]
    fn test_decoder_yields_one_line_per_call() {
        let mut framer = LineFramer::new();
        let mut buf = BytesMut::from(&b"OK\rV2.0\rpart"[..]);
        assert_eq!(framer.decode(&mut buf).unwrap(), Some("OK".to_string()));
        assert!(buf.is_empty());
        assert_eq!(framer.decode(&mut buf).unwrap(), Some("V2.0".to_string()));
        assert_eq!(framer.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"ial\r");
        assert_eq!(framer.decode(&mut buf).unwrap(), Some("partial".to_string()));
    }

    #[test]
    fn test_encoder_appends_cr() {
        let mut framer = LineFramer::new();
        let mut buf = BytesMut::new();
        framer.encode(Command::settings(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"settings\r");
    }
}
