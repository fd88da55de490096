//! Server-Sent Events framing.
//!
//! [`SseDecoder`] turns a byte stream into [`SseEvent`]s following the
//! `text/event-stream` field rules: lines end with LF, CRLF or CR, lines
//! starting with `:` are comments, `data` lines are joined with `\n`, a
//! single space after the field colon is dropped and a blank line dispatches
//! the pending event. Events without any data are never dispatched.
//! A line longer than the decoder's limit fails the stream.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

const BOM: char = '\u{feff}';

/// Longest line accepted by default, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1 << 20;

/// One dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type from the `event` field, if set.
    pub event: Option<String>,
    pub data: String,
    /// Last event id seen on the stream.
    pub id: Option<String>,
    /// Reconnection time requested by the server, in milliseconds.
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Whether this is a plain `message` event (no type or type `message`).
    #[must_use]
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("" | "message"))
    }
}

/// Incremental `text/event-stream` decoder.
#[derive(Debug)]
pub struct SseDecoder {
    data: String,
    event: Option<String>,
    last_id: Option<String>,
    retry: Option<u64>,
    started: bool,
    /// Bytes of the current line already searched for a terminator.
    scanned: usize,
    max_line_length: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self {
            data: String::new(),
            event: None,
            last_id: None,
            retry: None,
            started: false,
            scanned: 0,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject lines longer than `max` bytes.
    #[must_use]
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    fn decode_lines(&mut self, src: &mut BytesMut, eof: bool) -> io::Result<Option<SseEvent>> {
        while let Some(line) = self.next_line(src, eof)? {
            let mut line = line.as_str();
            if !self.started {
                self.started = true;
                line = line.strip_prefix(BOM).unwrap_or(line);
            }
            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    return Ok(Some(event));
                }
                continue;
            }
            self.process_field(line);
        }
        Ok(None)
    }

    /// Split the next complete line off `src`, without its terminator.
    ///
    /// Only bytes that arrived since the last call are searched. A trailing CR
    /// is held back until the next byte shows whether it starts a CRLF pair,
    /// unless the stream has ended.
    fn next_line(&mut self, src: &mut BytesMut, eof: bool) -> io::Result<Option<String>> {
        let start = self.scanned.min(src.len());
        let found = src[start..]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
            .map(|i| start + i);

        let Some(pos) = found else {
            self.scanned = src.len();
            self.check_line_length(src.len())?;
            if eof && !src.is_empty() {
                self.scanned = 0;
                let line = src.split();
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            return Ok(None);
        };
        self.check_line_length(pos)?;

        let terminator = if src[pos] == b'\r' {
            match src.get(pos + 1).copied() {
                Some(b'\n') => 2,
                Some(_) => 1,
                None if eof => 1,
                None => {
                    self.scanned = pos;
                    return Ok(None);
                }
            }
        } else {
            1
        };

        self.scanned = 0;
        let line = src.split_to(pos);
        src.advance(terminator);
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    fn check_line_length(&self, len: usize) -> io::Result<()> {
        if len > self.max_line_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("event stream line exceeds {} bytes", self.max_line_length),
            ));
        }
        Ok(())
    }

    fn process_field(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        Some(SseEvent {
            event: self.event.take(),
            data,
            id: self.last_id.clone(),
            retry: self.retry,
        })
    }
}

impl Decoder for SseDecoder {
    type Item = SseEvent;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decode_lines(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let event = self.decode_lines(src, true)?;
        if event.is_none() {
            // An event not terminated by a blank line is discarded at end of stream.
            src.clear();
            self.scanned = 0;
            self.data.clear();
            self.event = None;
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut SseDecoder, input: &str) -> Vec<SseEvent> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(event) = decoder.decode(&mut buf).unwrap() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_single_data_event() {
        let events = decode_all(&mut SseDecoder::new(), "data: {\"token\":\"hi\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"token\":\"hi\"}");
        assert!(events[0].is_message());
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let input = ": keep-alive\ndata: first\ndata:second\n\n";
        let events = decode_all(&mut SseDecoder::new(), input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn test_crlf_and_cr_line_endings() {
        let events = decode_all(&mut SseDecoder::new(), "data: a\r\n\r\ndata: b\r\rdata: c\n\n");
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, ["a", "b", "c"]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let mut buf = BytesMut::from("data: {\"tok");
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"en\":\"x\"}\r");
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\n\r\n");
        let event = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(event.data, "{\"token\":\"x\"}");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_named_events_and_ids() {
        let input = "event: done\nid: 7\ndata: {}\n\nretry: 1500\ndata: next\n\n";
        let events = decode_all(&mut SseDecoder::new(), input);
        assert_eq!(events[0].event.as_deref(), Some("done"));
        assert!(!events[0].is_message());
        assert_eq!(events[0].id.as_deref(), Some("7"));

        assert!(events[1].is_message());
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert_eq!(events[1].retry, Some(1500));
    }

    #[test]
    fn test_event_without_data_not_dispatched() {
        let events = decode_all(&mut SseDecoder::new(), "event: ping\n\n\n: hi\n\ndata: real\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "real");
        assert!(events[0].is_message());
    }

    #[test]
    fn test_bom_is_skipped() {
        let events = decode_all(&mut SseDecoder::new(), "\u{feff}data: x\n\n");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_unterminated_event_dropped_at_eof() {
        let mut decoder = SseDecoder::new();
        let mut buf = BytesMut::from("data: done\n\ndata: partial");
        assert_eq!(decoder.decode_eof(&mut buf).unwrap().unwrap().data, "done");
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_long_line_across_many_chunks() {
        let mut decoder = SseDecoder::new();
        let mut buf = BytesMut::from("data: ");
        for _ in 0..1000 {
            buf.extend_from_slice(b"abcdefghij");
            assert!(decoder.decode(&mut buf).unwrap().is_none());
            assert_eq!(decoder.scanned, buf.len());
        }

        buf.extend_from_slice(b"\n\n");
        let event = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(event.data.len(), 10_000);
        assert!(event.data.starts_with("abcdefghij"));
        assert_eq!(decoder.scanned, 0);
    }

    #[test]
    fn test_line_over_limit_is_error() {
        let mut decoder = SseDecoder::new().with_max_line_length(16);
        let mut buf = BytesMut::from("data: short\n\n");
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap().data, "short");

        buf.extend_from_slice(b"data: 0123456789abcdef");
        let err = decoder.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_terminated_line_over_limit_is_error() {
        let mut decoder = SseDecoder::new().with_max_line_length(8);
        let mut buf = BytesMut::from("data: far too long\n\n");
        let err = decoder.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
