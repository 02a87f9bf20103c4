//! Line-buffered decoder for newline-delimited JSON bodies
//!
//! The agent streams its reply as NDJSON over a chunked HTTP body. Chunk
//! boundaries are arbitrary, so a record (or a multi-byte character inside
//! one) may be split across any number of chunks. [`FrameDecoder`] carries the
//! unterminated tail over to the next chunk and only releases a record once
//! its newline has been seen; the tail is flushed once at end of stream.

use crate::error::{Error, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Incremental newline splitter with a carry-over buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every record it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            records.push(String::from_utf8_lossy(&self.buffer[start..end]).into_owned());
            start = end + 1;
            from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        records
    }

    /// End of stream: the retained tail, if any, as the final record.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        self.scanned = 0;
        let tail = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }

    /// Bytes held back waiting for a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Turn a chunked body into a lazy sequence of records.
///
/// A transport error is yielded once and ends the sequence; the unterminated
/// tail is discarded in that case since it can only be a truncated record.
pub fn records<S, E>(chunks: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<Error>,
{
    async_stream::stream! {
        let mut decoder = FrameDecoder::new();
        futures::pin_mut!(chunks);

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => {
                    for record in decoder.feed(&chunk) {
                        yield Ok(record);
                    }
                }
                Err(e) => {
                    let err: Error = e.into();
                    tracing::warn!(
                        pending_bytes = decoder.pending(),
                        "Agent stream failed: {}",
                        err
                    );
                    yield Err(err);
                    return;
                }
            }
        }

        if let Some(tail) = decoder.finish() {
            yield Ok(tail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn collect(chunks: &[&str]) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.feed(chunk.as_bytes()));
        }
        out.extend(decoder.finish());
        out
    }

    #[test]
    fn test_whole_records() {
        let out = collect(&["{\"a\":1}\n{\"b\":2}\n"]);
        assert_eq!(out, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_record_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"{\"type\":\"te").is_empty());
        assert_eq!(decoder.pending(), 11);

        let out = decoder.feed(b"xt\",\"content\":\"hi\"}\n");
        assert_eq!(out, vec!["{\"type\":\"text\",\"content\":\"hi\"}"]);
        assert_eq!(decoder.pending(), 0);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_record_split_across_many_chunks() {
        let out = collect(&["{\"x\"", ":", "1", "}", "\n"]);
        assert_eq!(out, vec!["{\"x\":1}"]);
    }

    #[test]
    fn test_long_record_in_small_chunks() {
        let record = format!("{{\"type\":\"text\",\"content\":\"{}\"}}", "x".repeat(10_000));
        let mut decoder = FrameDecoder::new();

        for chunk in record.as_bytes().chunks(7) {
            assert!(decoder.feed(chunk).is_empty());
            // Everything held back has been searched already
            assert_eq!(decoder.scanned, decoder.pending());
        }
        assert_eq!(decoder.feed(b"\nnext"), vec![record]);
        assert_eq!(decoder.scanned, 4);
        assert_eq!(decoder.finish().as_deref(), Some("next"));
        assert_eq!(decoder.scanned, 0);
    }

    #[test]
    fn test_trailing_record_flushed_once() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(b"one\ntwo"), vec!["one"]);
        assert_eq!(decoder.finish().as_deref(), Some("two"));
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_record_count_matches_newlines() {
        let cases: Vec<(Vec<&str>, usize)> = vec![
            (vec!["a\nb\nc\n"], 3),
            (vec!["a\nb\nc"], 3),
            (vec!["a", "\n", "\n", "b"], 3),
            (vec!["\n\n"], 2),
            (vec![""], 0),
            (vec!["no newline at all"], 1),
            (vec!["x\n", "", "y\nz"], 3),
        ];
        for (chunks, expected) in cases {
            let out = collect(&chunks);
            assert_eq!(out.len(), expected, "chunks: {:?}", chunks);
        }
    }

    #[test]
    fn test_split_multibyte_character() {
        let text = "{\"content\":\"héllo\"}\n";
        let bytes = text.as_bytes();
        // Split inside the two-byte 'é'
        let cut = text.find('é').unwrap() + 1;

        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&bytes[..cut]).is_empty());
        let out = decoder.feed(&bytes[cut..]);
        assert_eq!(out, vec!["{\"content\":\"héllo\"}"]);
    }

    #[test]
    fn test_records_stream_preserves_order() {
        let chunks = stream::iter(vec![
            Ok::<_, Error>(Bytes::from_static(b"1\n2")),
            Ok(Bytes::from_static(b"\n3\n")),
            Ok(Bytes::from_static(b"4")),
        ]);

        let out: Vec<String> = tokio_test::block_on(
            records(chunks).map(|r| r.unwrap()).collect::<Vec<_>>(),
        );
        assert_eq!(out, vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_records_stream_stops_on_error() {
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"first\npartial")),
            Err(Error::Agent("connection reset".to_string())),
            Ok(Bytes::from_static(b"never\n")),
        ]);

        let out: Vec<Result<String>> = records(chunks).collect().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "first");
        assert!(matches!(out[1], Err(Error::Agent(_))));
    }
}
