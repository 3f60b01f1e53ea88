//! Incremental consumer of the chunk sequence

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::pin;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::M3uGenerator;
use crate::models::Directory;

/// Forward the generator's chunks as a byte stream
pub fn byte_stream(generator: M3uGenerator, directory: Directory) -> impl Stream<Item = Bytes> + Send {
    async_stream::stream! {
        for chunk in generator.chunks(&directory) {
            yield Bytes::from(chunk);
        }
    }
}

/// Drain a chunk stream into `writer`, returning the number of bytes written
pub async fn write_stream<S, W>(stream: S, writer: &mut W) -> std::io::Result<usize>
where
    S: Stream<Item = Bytes>,
    W: AsyncWrite + Unpin,
{
    let mut stream = pin!(stream);
    let mut written = 0usize;
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        writer.write_all(&chunk).await?;
        written += chunk.len();
        chunks += 1;
    }
    writer.flush().await?;
    debug!("Streamed playlist: chunks={} bytes={}", chunks, written);
    Ok(written)
}
