use crate::types::Line;

use bytes::BytesMut;
use futures::stream::{self, Stream, StreamExt};
use std::io;
use std::sync::Arc;
use tokio::{io::AsyncRead, io::AsyncReadExt, sync::mpsc};
use tracing::warn;

const CHUNK: usize = 4096;

enum State<R> {
    Reading(R, BytesMut, usize),
    Failed(io::Error),
    Done,
}

/// Split a byte stream into lines as they arrive.
///
/// Bytes left after the last newline are yielded as a final line, also when the stream ends in a
/// read error. The error is yielded once, last.
pub(super) fn lines<R>(reader: R) -> impl Stream<Item = io::Result<Line>>
where
    R: AsyncRead + Unpin,
{
    let state = State::Reading(reader, BytesMut::with_capacity(CHUNK), 0);
    stream::unfold(state, |state| async move {
        let (mut reader, mut buf, mut scanned) = match state {
            State::Reading(reader, buf, scanned) => (reader, buf, scanned),
            State::Failed(err) => return Some((Err(err), State::Done)),
            State::Done => return None,
        };
        loop {
            if let Some(pos) = buf[scanned..].iter().position(|b| *b == b'\n') {
                let line = buf.split_to(scanned + pos + 1);
                return Some((Ok(decode(&line)), State::Reading(reader, buf, 0)));
            }
            scanned = buf.len();
            buf.reserve(CHUNK);
            match reader.read_buf(&mut buf).await {
                Ok(0) if buf.is_empty() => return None,
                Ok(0) => {
                    let rest = buf.split();
                    return Some((Ok(decode(&rest)), State::Done));
                }
                Ok(_) => {}
                Err(err) if buf.is_empty() => return Some((Err(err), State::Done)),
                Err(err) => {
                    let rest = buf.split();
                    return Some((Ok(decode(&rest)), State::Failed(err)));
                }
            }
        }
    })
}

fn decode(raw: &[u8]) -> Line {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Drain `reader` onto `output_tx` line by line.
///
/// Never closes the output channel on its own: dropping this task's sender only releases its share.
pub(super) async fn forward_lines<R>(
    reader: R,
    output_tx: mpsc::UnboundedSender<Line>,
    prefix: Arc<str>,
) where
    R: AsyncRead + Unpin,
{
    let lines = lines(reader);
    tokio::pin!(lines);
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                if output_tx.send(line).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(job = %prefix, error = %err, "Error reading output");
                break;
            }
        }
    }
}
