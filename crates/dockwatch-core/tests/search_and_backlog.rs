use dockwatch_core::backlog::{decode_backlog, render_backlog, split_chunks};
use dockwatch_core::frame::{encode_frame, LogFrame, StreamTag};
use dockwatch_core::highlight::Highlighter;
use dockwatch_core::logbuf::{LogBuffer, NavDirection};
use tokio_util::sync::CancellationToken;

fn sample_backlog() -> Vec<u8> {
    let mut wire = Vec::new();
    for index in 0..300 {
        let tag = if index % 7 == 0 {
            StreamTag::Stderr
        } else {
            StreamTag::Stdout
        };
        let text = if index % 5 == 0 {
            format!("{index}: ERROR Überlauf in worker-{}\n", index % 3)
        } else {
            format!("{index}: request served in {}ms\n", index * 3)
        };
        wire.extend(encode_frame(&LogFrame::new(tag, text.into_bytes())).expect("encode"));
    }
    wire
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chunked_backlog_equals_single_pass() {
    let text = decode_backlog(&sample_backlog()).expect("decode");
    let cancel = CancellationToken::new();
    let plain = Highlighter::plain();
    let coloured = Highlighter::default();
    let single_plain = plain.render(&text);
    let single_coloured = coloured.render(&text);

    for chunk_bytes in [1, 7, 64, 1_000, 60_000] {
        assert_eq!(split_chunks(&text, chunk_bytes).concat(), text);

        let chunked = render_backlog(&text, chunk_bytes, usize::MAX, &plain, &cancel)
            .await
            .expect("plain render");
        assert_eq!(chunked, single_plain, "chunk size {chunk_bytes}");

        let chunked = render_backlog(&text, chunk_bytes, usize::MAX, &coloured, &cancel)
            .await
            .expect("coloured render");
        assert_eq!(chunked, single_coloured, "chunk size {chunk_bytes}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quotes_spanning_lines_colour_the_same_in_any_chunking() {
    let text = (0..40)
        .map(|index| format!("echo \"start {index}\nstill inside quote\nend\"\n"))
        .collect::<String>();
    let coloured = Highlighter::default();
    let cancel = CancellationToken::new();
    let single = coloured.render(&text);

    for chunk_bytes in [1, 20, 333] {
        let chunked = render_backlog(&text, chunk_bytes, usize::MAX, &coloured, &cancel)
            .await
            .expect("render");
        assert_eq!(chunked.plain, single.plain);
        let differing = chunked
            .styled
            .iter()
            .zip(&single.styled)
            .filter(|(left, right)| left != right)
            .count();
        assert_eq!(differing, 0, "chunk size {chunk_bytes}");
    }

    let live = coloured.render("still inside quote\n");
    assert_eq!(live.styled[0], single.styled[1]);
}

#[test]
fn repeated_search_is_idempotent() {
    let text = decode_backlog(&sample_backlog()).expect("decode");
    let mut buffer = LogBuffer::new(10_000, Highlighter::default());
    buffer.append(&text);

    let first = buffer.search("überlauf").to_vec();
    let first_focus = buffer.focused().cloned();
    let second = buffer.search("überlauf").to_vec();
    let second_focus = buffer.focused().cloned();

    assert_eq!(first.len(), 60);
    assert_eq!(first, second);
    assert_eq!(first_focus, second_focus);
    assert_eq!(first_focus.map(|found| found.line), Some(295));
}

#[test]
fn navigation_after_research_restarts_at_newest() {
    let mut buffer = LogBuffer::new(10_000, Highlighter::plain());
    buffer.append(&decode_backlog(&sample_backlog()).expect("decode"));
    buffer.search("error");
    buffer.navigate(NavDirection::Older);
    buffer.navigate(NavDirection::Older);
    assert_eq!(buffer.focused().map(|found| found.line), Some(285));

    buffer.search("error");
    assert_eq!(buffer.focused().map(|found| found.line), Some(295));
    assert_eq!(buffer.focus_position(), Some((60, 60)));
}
