//! Incremental decoding of a response byte stream into text fragments.

use futures_util::stream::{self, Stream, StreamExt};

use crate::error::ResponderError;
use crate::responder::FragmentStream;

/// UTF-8 decoder that tolerates characters split across chunk boundaries
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every complete character seen so far. An incomplete trailing
    /// sequence is held back until the next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    // valid_up_to guarantees this slice is UTF-8
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + bad;
                        }
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// Flush whatever is left at end of stream
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Turn a byte stream into a fragment stream. Empty fragments are skipped and
/// the stream ends after the first transport error.
pub fn decode_fragments<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ResponderError> + Send + 'static,
{
    let state = (Box::pin(bytes), Utf8Decoder::new(), false);
    stream::unfold(state, |(mut bytes, mut decoder, done)| async move {
        if done {
            return None;
        }
        loop {
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    let text = decoder.decode(chunk.as_ref());
                    if !text.is_empty() {
                        return Some((Ok(text), (bytes, decoder, false)));
                    }
                }
                Some(Err(err)) => {
                    let err: ResponderError = err.into();
                    return Some((Err(err), (bytes, decoder, true)));
                }
                None => {
                    let tail = decoder.finish();
                    if tail.is_empty() {
                        return None;
                    }
                    return Some((Ok(tail), (bytes, decoder, true)));
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_ascii() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"Hel"), "Hel");
        assert_eq!(decoder.decode(b"lo"), "lo");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decode_split_multibyte() {
        // "é" is 0xC3 0xA9
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'c', b'a', b'f', 0xC3]), "caf");
        assert_eq!(decoder.decode(&[0xA9, b'!']), "é!");
    }

    #[test]
    fn test_decode_four_byte_split_three_ways() {
        let crab = "🦀".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&crab[..1]), "");
        assert_eq!(decoder.decode(&crab[1..3]), "");
        assert_eq!(decoder.decode(&crab[3..]), "🦀");
    }

    #[test]
    fn test_decode_invalid_byte_is_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_flushes_truncated_sequence() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[tokio::test]
    async fn test_decode_fragments_skips_empty_chunks() {
        let chunks: Vec<Result<Vec<u8>, ResponderError>> = vec![
            Ok(b"Hel".to_vec()),
            Ok(vec![0xC3]),
            Ok(vec![0xA9]),
            Ok(Vec::new()),
            Ok(b"lo".to_vec()),
        ];
        let fragments: Vec<String> = decode_fragments(stream::iter(chunks))
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hel", "é", "lo"]);
    }

    #[tokio::test]
    async fn test_decode_fragments_stops_after_error() {
        let chunks: Vec<Result<Vec<u8>, ResponderError>> = vec![
            Ok(b"partial".to_vec()),
            Err(ResponderError::Other("connection reset".to_string())),
            Ok(b"never".to_vec()),
        ];
        let items: Vec<_> = decode_fragments(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(items[1].is_err());
    }
}
