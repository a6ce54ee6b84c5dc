//! The staged per-object record stream.
//!
//! One storage object's byte stream runs through three stages: gzip
//! decompression, line splitting, and record parsing/serialization. Each
//! stage pulls from its predecessor on demand, so peak memory is bounded by
//! the codec buffers rather than the object size, and downstream backpressure
//! propagates all the way to the source read.

use crate::record;
use anyhow::{Context, Result};
use async_compression::tokio::bufread::GzipDecoder;
use tokio::io::{AsyncRead, BufReader};
use tokio_stream::{Stream, StreamExt};
use tokio_util::codec::{FramedRead, LinesCodec};

/// Builds the record stream for one object: decompress, split lines, parse,
/// serialize. Emits one wire-ready JSON document per input line.
///
/// The stream ends when the underlying byte stream ends. A read or
/// decompression error surfaces as an `Err` item; callers escalate it to the
/// whole batch instead of retrying the object.
pub fn record_stream<R>(
    reader: R,
    offset_hours: f64,
) -> impl Stream<Item = Result<Vec<u8>>> + Send
where
    R: AsyncRead + Send + Unpin,
{
    let decompressed = GzipDecoder::new(BufReader::new(reader));
    let lines = FramedRead::new(decompressed, LinesCodec::new());

    lines.map(move |line| {
        let line = line.context("failed to read line from log object stream")?;
        let parsed = record::parse_line(&line, offset_hours);
        serde_json::to_vec(&parsed).context("failed to encode log record to JSON")
    })
}
