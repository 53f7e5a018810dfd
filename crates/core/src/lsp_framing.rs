//! LSP Base Protocol framing.
//!
//! Language servers speak `Content-Length: N\r\n\r\n<N bytes of JSON>` over
//! stdio, with no guarantee that a single stdout read lines up with a
//! message boundary. [`FrameDecoder`] buffers arbitrary byte chunks and
//! yields complete message bodies exactly once each, regardless of how the
//! input was chunked — framing must be invertible no matter where the
//! underlying reads happen to split.

use bytes::{Buf, BytesMut};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Incrementally parses `Content-Length`-framed messages from a byte stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly read bytes into the internal buffer.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pull the next complete message body, if the buffer holds one.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A header block naming
    /// a missing or non-numeric `Content-Length` is discarded and the
    /// decoder resynchronises on the next header terminator instead of
    /// failing the whole stream — a single corrupt message shouldn't kill
    /// the socket.
    pub fn next_message(&mut self) -> Result<Option<Vec<u8>>, String> {
        loop {
            let header_end = match find_subslice(&self.buf, HEADER_TERMINATOR) {
                Some(idx) => idx,
                None => return Ok(None),
            };
            let body_start = header_end + HEADER_TERMINATOR.len();

            let content_length = match parse_content_length(&self.buf[..header_end]) {
                Ok(len) => len,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed lsp header block");
                    self.buf.advance(body_start);
                    continue;
                }
            };
            let body_end = body_start + content_length;

            if self.buf.len() < body_end {
                return Ok(None);
            }

            let body = self.buf[body_start..body_end].to_vec();
            self.buf.advance(body_end);
            return Ok(Some(body));
        }
    }
}

fn parse_content_length(header: &[u8]) -> Result<usize, String> {
    let header = std::str::from_utf8(header).map_err(|_| "header is not valid UTF-8".to_string())?;
    for line in header.split("\r\n") {
        if let Some(value) = line
            .strip_prefix("Content-Length:")
            .or_else(|| line.strip_prefix("content-length:"))
        {
            return value
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid Content-Length value: {value}"));
        }
    }
    Err("missing Content-Length header".to_string())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Encode a JSON message body into a framed wire message.
pub fn encode_message(body: &[u8]) -> Vec<u8> {
    let mut out = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_single_message_fed_whole() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&encode_message(br#"{"jsonrpc":"2.0"}"#));
        let msg = decoder.next_message().unwrap().unwrap();
        assert_eq!(msg, br#"{"jsonrpc":"2.0"}"#);
        assert_eq!(decoder.next_message().unwrap(), None);
    }

    #[test]
    fn decodes_a_message_split_across_many_chunks() {
        let framed = encode_message(br#"{"id":1,"method":"initialize"}"#);
        let mut decoder = FrameDecoder::new();
        let mut result = None;
        for byte in framed {
            decoder.push(&[byte]);
            if let Some(msg) = decoder.next_message().unwrap() {
                result = Some(msg);
            }
        }
        assert_eq!(result.unwrap(), br#"{"id":1,"method":"initialize"}"#);
    }

    #[test]
    fn decodes_back_to_back_messages_in_one_chunk() {
        let mut framed = encode_message(b"first");
        framed.extend_from_slice(&encode_message(b"second"));
        let mut decoder = FrameDecoder::new();
        decoder.push(&framed);
        assert_eq!(decoder.next_message().unwrap().unwrap(), b"first");
        assert_eq!(decoder.next_message().unwrap().unwrap(), b"second");
        assert_eq!(decoder.next_message().unwrap(), None);
    }

    #[test]
    fn discards_malformed_header_block_and_resyncs() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"X-Custom: 1\r\n\r\n");
        assert_eq!(decoder.next_message().unwrap(), None);
        decoder.push(&encode_message(b"recovered"));
        assert_eq!(decoder.next_message().unwrap().unwrap(), b"recovered");
    }

    #[test]
    fn round_trip_is_invertible_regardless_of_chunking() {
        let body = br#"{"result":null,"id":42}"#;
        let framed = encode_message(body);
        for split in 0..framed.len() {
            let mut decoder = FrameDecoder::new();
            decoder.push(&framed[..split]);
            decoder.push(&framed[split..]);
            assert_eq!(decoder.next_message().unwrap().unwrap(), body);
        }
    }
}
