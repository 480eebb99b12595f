//! Server-Sent Events decoding for `?alt=sse` streaming responses

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

/// Split a chunked byte stream into SSE event payloads.
///
/// Consecutive `data:` lines make up one event and are joined with `\n`; a
/// blank line dispatches it. Comments, other fields and `[DONE]` markers are
/// skipped. A read error is yielded once and ends the stream, dropping any
/// event that had not been terminated. When the body ends, a pending event
/// and a trailing line without a newline are still processed.
pub fn data_lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Send + 'static,
{
    let initial: (S, BytesMut, Option<String>, bool) =
        (byte_stream, BytesMut::with_capacity(8192), None, false);

    futures::stream::unfold(
        initial,
        |(mut stream, mut buffer, mut pending, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line = buffer.split_to(newline_pos + 1);
                    line.truncate(line.len() - 1);
                    if line.last() == Some(&b'\r') {
                        line.truncate(line.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line) else {
                        tracing::warn!("Skipping non-UTF-8 SSE line");
                        continue;
                    };
                    if line.is_empty() {
                        if let Some(data) = pending.take().and_then(finish_event) {
                            return Some((Ok(data), (stream, buffer, None, false)));
                        }
                        continue;
                    }
                    if let Some(value) = data_field(line) {
                        append_data(&mut pending, value);
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => return Some((Err(e), (stream, buffer, None, true))),
                    None => {
                        if let Some(value) = std::str::from_utf8(&buffer).ok().and_then(data_field) {
                            append_data(&mut pending, value);
                        }
                        buffer.clear();
                        return pending
                            .take()
                            .and_then(finish_event)
                            .map(|data| (Ok(data), (stream, buffer, None, true)));
                    }
                }
            }
        },
    )
}

/// Value of a `data:` field line, with the single optional leading space removed
fn data_field(line: &str) -> Option<&str> {
    let line = line.trim_end_matches('\r');
    let value = line.strip_prefix("data:")?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

fn append_data(pending: &mut Option<String>, value: &str) {
    match pending {
        Some(data) => {
            data.push('\n');
            data.push_str(value);
        }
        None => *pending = Some(value.to_string()),
    }
}

fn finish_event(data: String) -> Option<String> {
    let trimmed = data.trim();
    if trimmed.is_empty() || trimmed == "[DONE]" {
        return None;
    }
    Some(data)
}
