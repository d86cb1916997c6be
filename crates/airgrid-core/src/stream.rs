use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Owned, chunked payload. Dropping it releases the underlying source.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

pub fn stream_from_bytes(body: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move {
        Ok::<_, std::io::Error>(body)
    }))
}
