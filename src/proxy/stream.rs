//! Body helpers: fixed-size re-chunking for streamed results and full
//! collection for buffered ones.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use super::transport::ByteStream;
use crate::error::CallError;

/// Size of each chunk handed to the caller for streamed results.
pub const CHUNK_SIZE: usize = 8192;

/// Re-slice `source` into `chunk_size` chunks; only the last may be shorter.
///
/// The returned stream owns `source`, so dropping it early (caller gone)
/// releases the upstream connection.
#[must_use]
pub fn rechunk(source: ByteStream, chunk_size: usize) -> ByteStream {
    Box::pin(fixed_chunks(source, chunk_size.max(1)))
}

fn fixed_chunks(
    mut source: ByteStream,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes, CallError>> + Send {
    async_stream::try_stream! {
        let mut pending = BytesMut::new();
        while let Some(data) = source.next().await {
            pending.extend_from_slice(&data?);
            while pending.len() >= chunk_size {
                yield pending.split_to(chunk_size).freeze();
            }
        }
        if !pending.is_empty() {
            yield pending.freeze();
        }
    }
}

/// Drain a body completely into memory.
pub async fn collect(mut body: ByteStream) -> Result<Bytes, CallError> {
    let mut buf = BytesMut::new();
    while let Some(data) = body.next().await {
        buf.extend_from_slice(&data?);
    }
    Ok(buf.freeze())
}

/// Read at most `limit` bytes of `body` and drop the remainder unread.
pub async fn collect_prefix(mut body: ByteStream, limit: usize) -> Result<Bytes, CallError> {
    let mut buf = BytesMut::new();
    while buf.len() < limit {
        match body.next().await {
            Some(data) => buf.extend_from_slice(&data?),
            None => break,
        }
    }
    buf.truncate(limit);
    Ok(buf.freeze())
}
