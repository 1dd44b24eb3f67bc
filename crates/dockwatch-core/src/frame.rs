//! Multiplexed log stream framing.
//!
//! Every frame is an 8 byte header followed by the payload:
//!
//! ```text
//! [tag: u8][0, 0, 0][len: u32 big-endian][payload; len]
//! ```
//!
//! The tag is 1 for stdout and 2 for stderr. Other values are carried through
//! untouched and displayed like stdout.

use std::borrow::Cow;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamTag {
    Stdin,
    Stdout,
    Stderr,
    Other(u8),
}

impl StreamTag {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => StreamTag::Stdin,
            1 => StreamTag::Stdout,
            2 => StreamTag::Stderr,
            other => StreamTag::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            StreamTag::Stdin => 0,
            StreamTag::Stdout => 1,
            StreamTag::Stderr => 2,
            StreamTag::Other(byte) => byte,
        }
    }

    pub fn is_stderr(self) -> bool {
        matches!(self, StreamTag::Stderr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    pub tag: StreamTag,
    pub payload: Vec<u8>,
}

impl LogFrame {
    pub fn new(tag: StreamTag, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("truncated frame: expected {expected} payload bytes, received {received}")]
    TruncatedFrame { expected: usize, received: usize },
    #[error("payload exceeds frame limit: {size} bytes")]
    OversizedPayload { size: usize },
    #[error("frame read failed: {0}")]
    Io(#[from] io::Error),
}

pub fn encode_frame(frame: &LogFrame) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(frame.payload.len()).map_err(|_| FrameError::OversizedPayload {
        size: frame.payload.len(),
    })?;
    let mut encoded = Vec::with_capacity(HEADER_LEN + frame.payload.len());
    encoded.push(frame.tag.as_byte());
    encoded.extend_from_slice(&[0, 0, 0]);
    encoded.extend_from_slice(&len.to_be_bytes());
    encoded.extend_from_slice(&frame.payload);
    Ok(encoded)
}

fn parse_header(header: &[u8; HEADER_LEN]) -> (StreamTag, usize) {
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    (StreamTag::from_byte(header[0]), len as usize)
}

/// Pulls frames off an async byte source one at a time.
///
/// A short header at end-of-stream is a clean end; a short payload is a
/// `TruncatedFrame` and the reader should be abandoned.
pub struct FrameReader<R> {
    reader: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub async fn next_frame(&mut self) -> Result<Option<LogFrame>, FrameError> {
        let mut header = [0u8; HEADER_LEN];
        let filled = read_full(&mut self.reader, &mut header).await?;
        if filled < HEADER_LEN {
            return Ok(None);
        }
        let (tag, len) = parse_header(&header);
        let mut payload = vec![0u8; len];
        let received = read_full(&mut self.reader, &mut payload).await?;
        if received < len {
            return Err(FrameError::TruncatedFrame {
                expected: len,
                received,
            });
        }
        Ok(Some(LogFrame { tag, payload }))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = reader.read(&mut buf[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

/// Iterates the frames of an in-memory buffer, such as a fetched backlog.
pub struct SliceFrames<'a> {
    remaining: &'a [u8],
    failed: bool,
}

impl<'a> SliceFrames<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            remaining: bytes,
            failed: false,
        }
    }
}

impl Iterator for SliceFrames<'_> {
    type Item = Result<LogFrame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.len() < HEADER_LEN {
            return None;
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&self.remaining[..HEADER_LEN]);
        let (tag, len) = parse_header(&header);
        let body = &self.remaining[HEADER_LEN..];
        if body.len() < len {
            self.failed = true;
            return Some(Err(FrameError::TruncatedFrame {
                expected: len,
                received: body.len(),
            }));
        }
        let payload = body[..len].to_vec();
        self.remaining = &body[len..];
        Some(Ok(LogFrame { tag, payload }))
    }
}
