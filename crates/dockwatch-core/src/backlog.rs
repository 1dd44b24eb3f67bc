//! Bulk backlog processing: decode the framed body, colour it in parallel
//! chunks, and stitch the chunks back together in order.

use crate::frame::{FrameError, SliceFrames};
use crate::highlight::{Highlighter, RenderedText};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_CHUNK_BYTES: usize = 60_000;
pub const DEFAULT_MAX_LINES: usize = 10_000;

#[derive(Debug, Error)]
pub enum BacklogError {
    #[error("backlog processing cancelled")]
    Cancelled,
    #[error("backlog worker failed: {0}")]
    Worker(String),
}

/// Concatenates every frame payload of a fetched backlog body.
pub fn decode_backlog(bytes: &[u8]) -> Result<String, FrameError> {
    let mut payload = Vec::with_capacity(bytes.len());
    for frame in SliceFrames::new(bytes) {
        payload.extend_from_slice(&frame?.payload);
    }
    Ok(String::from_utf8_lossy(&payload).into_owned())
}

/// Splits text into chunks of at least `chunk_bytes`, each ending on a line boundary
/// (except possibly the last).
pub fn split_chunks(text: &str, chunk_bytes: usize) -> Vec<&str> {
    let chunk_bytes = chunk_bytes.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() <= chunk_bytes {
            chunks.push(rest);
            break;
        }
        let cut = rest.as_bytes()[chunk_bytes - 1..]
            .iter()
            .position(|byte| *byte == b'\n')
            .map(|offset| chunk_bytes + offset)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(cut);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

/// Colours `text` chunk by chunk on blocking workers and returns the last
/// `max_lines` lines in input order.
pub async fn render_backlog(
    text: &str,
    chunk_bytes: usize,
    max_lines: usize,
    highlighter: &Highlighter,
    cancel: &CancellationToken,
) -> Result<RenderedText, BacklogError> {
    if highlighter.is_plain() {
        let mut rendered = RenderedText::plain(text);
        rendered.keep_last(max_lines);
        return Ok(rendered);
    }
    let chunks = split_chunks(text, chunk_bytes);
    debug!(
        event = "backlog_render",
        bytes = text.len(),
        chunks = chunks.len()
    );

    let mut workers = JoinSet::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let chunk = chunk.to_string();
        let highlighter = highlighter.clone();
        workers.spawn_blocking(move || (index, highlighter.render(&chunk)));
    }

    let mut slots: Vec<Option<RenderedText>> = vec![None; chunks.len()];
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                workers.abort_all();
                return Err(BacklogError::Cancelled);
            }
            next = workers.join_next() => match next {
                None => break,
                Some(Ok((index, rendered))) => slots[index] = Some(rendered),
                Some(Err(err)) => {
                    workers.abort_all();
                    return Err(BacklogError::Worker(err.to_string()));
                }
            },
        }
    }

    let mut combined = RenderedText::empty();
    for rendered in slots.into_iter().flatten() {
        combined.extend(rendered);
    }
    combined.keep_last(max_lines);
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_frame, LogFrame, StreamTag};

    #[test]
    fn chunks_end_on_line_boundaries() {
        let text = "aaaa\nbb\ncccccc\nd";
        let chunks = split_chunks(text, 5);
        assert_eq!(chunks, vec!["aaaa\n", "bb\ncccccc\n", "d"]);
        assert_eq!(chunks.concat(), text);
        assert!(split_chunks("", 10).is_empty());
        assert_eq!(split_chunks("no newline at all", 4), vec!["no newline at all"]);
    }

    #[test]
    fn backlog_payloads_are_concatenated() {
        let mut wire = Vec::new();
        for (tag, text) in [(StreamTag::Stdout, "one\n"), (StreamTag::Stderr, "two\n")] {
            wire.extend(encode_frame(&LogFrame::new(tag, text.as_bytes().to_vec())).expect("encode"));
        }
        assert_eq!(decode_backlog(&wire).expect("decode"), "one\ntwo\n");

        wire.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 4, b'x']);
        assert!(matches!(
            decode_backlog(&wire),
            Err(FrameError::TruncatedFrame { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn chunked_render_matches_single_pass() {
        let text = (0..500)
            .map(|index| format!("line {index} status=ok\n"))
            .collect::<String>();
        let highlighter = Highlighter::plain();
        let cancel = CancellationToken::new();

        let chunked = render_backlog(&text, 64, usize::MAX, &highlighter, &cancel)
            .await
            .expect("render");
        assert_eq!(chunked, highlighter.render(&text));

        let capped = render_backlog(&text, 64, 10, &highlighter, &cancel)
            .await
            .expect("render");
        assert_eq!(capped.len(), 10);
        assert_eq!(capped.plain[0], "line 490 status=ok");
    }

    #[tokio::test]
    async fn cancelled_render_stops() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = render_backlog("a\nb\n", 1, 10, &Highlighter::default(), &cancel).await;
        assert!(matches!(result, Err(BacklogError::Cancelled)));
    }
}
