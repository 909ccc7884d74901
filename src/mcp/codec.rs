//! Line codec for the stdio transport.
//!
//! Frame format: one JSON-RPC message per line, UTF-8, terminated by `\n`
//! (a trailing `\r` is tolerated). Blank lines are skipped. Lines longer
//! than `max_bytes` are discarded whole and reported as [`Frame::Oversized`]
//! so the reader stays in sync with the stream.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// One unit read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Message(String),
    /// A line exceeded the limit; its bytes were dropped.
    Oversized,
}

/// Read the next non-blank line. Returns `None` on clean EOF.
pub async fn read_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> std::io::Result<Option<Frame>> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
        let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }

        let terminated = buf.last() == Some(&b'\n');
        if !terminated && buf.len() > max_bytes {
            discard_line(reader).await?;
            return Ok(Some(Frame::Oversized));
        }

        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        return Ok(Some(Frame::Message(String::from_utf8_lossy(&buf).into_owned())));
    }
}

/// Skip to just past the next newline (or EOF).
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }
}

/// Write one message as a single line and flush.
pub async fn write_frame<W: AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    message: &T,
) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
