//! Framed transport (C1): `Content-Length`-delimited JSON-RPC messages over a
//! duplex byte stream, as used by LSP.
//!
//! Each message is a block of CRLF-terminated HTTP-style headers, a blank
//! CRLF line, then exactly `Content-Length` bytes of UTF-8 JSON. Readers and
//! writers are split so a session can own a reader task and a writer handle
//! independently.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

/// Reads framed JSON messages from an async byte stream.
pub struct MessageReader<R> {
    inner: R,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    /// Wraps a buffered reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads one message, or `None` on clean EOF before any header bytes
    /// were read.
    ///
    /// # Errors
    /// Returns [`TransportError::BadHeader`] if a header line has no colon
    /// or `Content-Length` is missing/non-positive, [`TransportError::ShortRead`]
    /// if the stream ends mid-payload, and [`TransportError::BadUtf8`] /
    /// [`TransportError::BadJson`] on decode failures.
    pub async fn read_message(&mut self) -> Result<Option<serde_json::Value>, TransportError> {
        let mut content_length: Option<usize> = None;
        let mut saw_any_header_line = false;

        loop {
            let mut line = String::new();
            let n = self.inner.read_line(&mut line).await?;
            if n == 0 {
                if saw_any_header_line {
                    return Err(TransportError::ShortRead {
                        got: 0,
                        expected: content_length.unwrap_or(0),
                    });
                }
                return Ok(None);
            }

            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                // Blank line: end of headers.
                break;
            }
            saw_any_header_line = true;

            let Some((name, value)) = trimmed.split_once(':') else {
                return Err(TransportError::BadHeader(trimmed.to_string()));
            };
            if name.trim().eq_ignore_ascii_case("content-length") {
                let parsed: i64 = value
                    .trim()
                    .parse()
                    .map_err(|_| TransportError::BadHeader(trimmed.to_string()))?;
                if parsed <= 0 {
                    return Err(TransportError::BadHeader(trimmed.to_string()));
                }
                content_length = Some(parsed as usize);
            }
            // Other headers (e.g. Content-Type) are accepted and ignored.
        }

        let expected = content_length
            .ok_or_else(|| TransportError::BadHeader("missing Content-Length".to_string()))?;

        let mut buf = vec![0u8; expected];
        let mut read_so_far = 0usize;
        while read_so_far < expected {
            let n = self.inner.read(&mut buf[read_so_far..]).await?;
            if n == 0 {
                return Err(TransportError::ShortRead {
                    got: read_so_far,
                    expected,
                });
            }
            read_so_far += n;
        }

        let text = String::from_utf8(buf)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        Ok(Some(value))
    }
}

/// Writes framed JSON messages to an async byte stream.
pub struct MessageWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Serializes `value` compactly, prepends a `Content-Length` header, and
    /// flushes. One call writes one complete, unfragmented frame, so callers
    /// serializing writes behind a mutex never observe interleaved framing.
    ///
    /// # Errors
    /// Propagates I/O errors from the underlying stream.
    pub async fn write_message(&mut self, value: &serde_json::Value) -> Result<(), TransportError> {
        let body = serde_json::to_vec(value)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.inner.write_all(header.as_bytes()).await?;
        self.inner.write_all(&body).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Closes the underlying writer half. Used by the session layer to
    /// release the write side of the pipe on shutdown.
    pub(crate) async fn shutdown(&mut self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    async fn round_trip(value: serde_json::Value) -> serde_json::Value {
        let mut buf = Vec::new();
        {
            let mut w = MessageWriter::new(&mut buf);
            w.write_message(&value).await.unwrap();
        }
        let mut r = MessageReader::new(BufReader::new(&buf[..]));
        r.read_message().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn writes_and_reads_a_frame() {
        let value = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        assert_eq!(round_trip(value.clone()).await, value);
    }

    #[tokio::test]
    async fn clean_eof_returns_none() {
        let mut r = MessageReader::new(BufReader::new(&b""[..]));
        assert!(r.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_colon_is_bad_header() {
        let raw = b"Content-Length 13\r\n\r\n{\"a\":1}".to_vec();
        let mut r = MessageReader::new(BufReader::new(&raw[..]));
        let err = r.read_message().await.unwrap_err();
        assert!(matches!(err, TransportError::BadHeader(_)));
    }

    #[tokio::test]
    async fn non_positive_content_length_is_bad_header() {
        let raw = b"Content-Length: 0\r\n\r\n".to_vec();
        let mut r = MessageReader::new(BufReader::new(&raw[..]));
        let err = r.read_message().await.unwrap_err();
        assert!(matches!(err, TransportError::BadHeader(_)));
    }

    #[tokio::test]
    async fn short_payload_is_short_read() {
        let raw = b"Content-Length: 100\r\n\r\n{\"a\":1}".to_vec();
        let mut r = MessageReader::new(BufReader::new(&raw[..]));
        let err = r.read_message().await.unwrap_err();
        assert!(matches!(err, TransportError::ShortRead { .. }));
    }

    #[tokio::test]
    async fn invalid_json_payload_is_bad_json() {
        let body = b"not json".to_vec();
        let mut raw = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        raw.extend_from_slice(&body);
        let mut r = MessageReader::new(BufReader::new(&raw[..]));
        let err = r.read_message().await.unwrap_err();
        assert!(matches!(err, TransportError::BadJson(_)));
    }

    #[tokio::test]
    async fn reads_multiple_messages_back_to_back() {
        let a = json!({"id": 1});
        let b = json!({"id": 2});
        let mut buf = Vec::new();
        {
            let mut w = MessageWriter::new(&mut buf);
            w.write_message(&a).await.unwrap();
            w.write_message(&b).await.unwrap();
        }
        let mut r = MessageReader::new(BufReader::new(&buf[..]));
        assert_eq!(r.read_message().await.unwrap().unwrap(), a);
        assert_eq!(r.read_message().await.unwrap().unwrap(), b);
        assert!(r.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ignores_unrelated_headers_case_insensitively() {
        let body = b"{}".to_vec();
        let raw = format!(
            "content-type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        let mut full = raw;
        full.extend_from_slice(&body);
        let mut r = MessageReader::new(BufReader::new(&full[..]));
        assert_eq!(r.read_message().await.unwrap().unwrap(), json!({}));
    }
}
