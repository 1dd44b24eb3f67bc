//! Splits the engine's newline-delimited event body into [`RuntimeEvent`]s.

use crate::runtime::RuntimeEvent;
use bytes::BytesMut;
use thiserror::Error;

/// Real engine events stay well under this.
pub const MAX_EVENT_LINE_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventLineError {
    #[error("event line too long: {size} > {max} bytes")]
    TooLong { size: usize, max: usize },
    #[error("event line is not valid JSON: {0}")]
    Malformed(String),
}

/// Buffers body chunks and hands back one event per complete line.
#[derive(Debug)]
pub struct EventLines {
    buf: BytesMut,
    max_line_bytes: usize,
    /// Set after an over-long line was reported; its remainder is dropped up to the next newline.
    discarding: bool,
    ended: bool,
}

impl Default for EventLines {
    fn default() -> Self {
        Self::with_max_line(MAX_EVENT_LINE_BYTES)
    }
}

impl EventLines {
    pub fn with_max_line(max_line_bytes: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_line_bytes,
            discarding: false,
            ended: false,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Marks the body as finished so an unterminated last line is still decoded.
    pub fn finish(&mut self) {
        self.ended = true;
    }

    /// Next event from the buffered bytes, or `None` until more input arrives.
    /// Blank lines are skipped.
    pub fn next_event(&mut self) -> Option<Result<RuntimeEvent, EventLineError>> {
        loop {
            let line = match self.buf.iter().position(|byte| *byte == b'\n') {
                Some(at) => self.buf.split_to(at + 1),
                None if self.ended && !self.buf.is_empty() => self.buf.split(),
                None => return self.overflow(),
            };
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if line.len() > self.max_line_bytes {
                return Some(Err(EventLineError::TooLong {
                    size: line.len(),
                    max: self.max_line_bytes,
                }));
            }
            return Some(
                serde_json::from_slice(&line).map_err(|err| EventLineError::Malformed(err.to_string())),
            );
        }
    }

    fn overflow(&mut self) -> Option<Result<RuntimeEvent, EventLineError>> {
        if self.buf.len() <= self.max_line_bytes {
            return None;
        }
        let size = self.buf.len();
        self.buf.clear();
        if std::mem::replace(&mut self.discarding, true) {
            return None;
        }
        Some(Err(EventLineError::TooLong {
            size,
            max: self.max_line_bytes,
        }))
    }
}
