//! `Content-Length` framing for the editor channel.
//!
//! LSP frames every JSON-RPC message as `Content-Length: N\r\n\r\n{json}`.
//! The server reads client messages from stdin with [`MessageReader`] and
//! writes responses and notifications to stdout with [`MessageWriter`].

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum frame size (4 MiB). Full-text sync of a large file fits comfortably.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error on editor channel: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected EOF while reading headers")]
    TruncatedHeaders,
    #[error("missing Content-Length header")]
    MissingContentLength,
    #[error("invalid Content-Length value {0:?}")]
    InvalidContentLength(String),
    #[error("Content-Length {0} exceeds maximum {MAX_FRAME_BYTES}")]
    FrameTooLarge(usize),
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads framed messages from the client.
pub struct MessageReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message.
    ///
    /// Returns `Ok(None)` when the client closes the stream between messages.
    pub async fn read_message(&mut self) -> Result<Option<serde_json::Value>, CodecError> {
        let Some(content_length) = self.read_headers().await? else {
            return Ok(None);
        };
        if content_length > MAX_FRAME_BYTES {
            return Err(CodecError::FrameTooLarge(content_length));
        }

        let mut body = vec![0u8; content_length];
        self.reader.read_exact(&mut body).await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Returns the `Content-Length` value, or `None` on EOF before any header.
    async fn read_headers(&mut self) -> Result<Option<usize>, CodecError> {
        let mut content_length = None;
        let mut line = String::new();
        let mut started = false;

        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                if started {
                    return Err(CodecError::TruncatedHeaders);
                }
                return Ok(None);
            }
            started = true;

            let header = line.trim();
            if header.is_empty() {
                break;
            }

            // Other headers (Content-Type) are accepted and ignored.
            if let Some((name, value)) = header.split_once(':')
                && name.trim().eq_ignore_ascii_case("Content-Length")
            {
                let value = value.trim();
                content_length = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| CodecError::InvalidContentLength(value.to_string()))?,
                );
            }
        }

        content_length
            .map(Some)
            .ok_or(CodecError::MissingContentLength)
    }
}

/// Writes framed messages to the client.
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `message` and write it with its `Content-Length` header.
    pub async fn write_message<T: Serialize>(&mut self, message: &T) -> Result<(), CodecError> {
        let body = serde_json::to_vec(message)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        self.writer.write_all(header.as_bytes()).await?;
        self.writer.write_all(&body).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(body: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{body}", body.len()).into_bytes()
    }

    #[tokio::test]
    async fn test_reads_consecutive_messages() {
        let mut input = frame(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#);
        input.extend(frame(r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#));

        let mut reader = MessageReader::new(input.as_slice());
        let first = reader.read_message().await.unwrap().unwrap();
        let second = reader.read_message().await.unwrap().unwrap();
        assert_eq!(first["method"], "initialize");
        assert_eq!(second["method"], "initialized");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_returns_none() {
        let mut reader = MessageReader::new(&b""[..]);
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_mid_headers_is_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 10\r\n"[..]);
        assert!(matches!(
            reader.read_message().await,
            Err(CodecError::TruncatedHeaders)
        ));
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let mut reader = MessageReader::new(&b"Content-Type: application/json\r\n\r\n{}"[..]);
        assert!(matches!(
            reader.read_message().await,
            Err(CodecError::MissingContentLength)
        ));
    }

    #[tokio::test]
    async fn test_invalid_content_length_value() {
        let mut reader = MessageReader::new(&b"Content-Length: lots\r\n\r\n"[..]);
        assert!(matches!(
            reader.read_message().await,
            Err(CodecError::InvalidContentLength(v)) if v == "lots"
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let header = format!("Content-Length: {}\r\n\r\n", MAX_FRAME_BYTES + 1);
        let mut reader = MessageReader::new(header.as_bytes());
        assert!(matches!(
            reader.read_message().await,
            Err(CodecError::FrameTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_case_insensitive_header_and_extra_headers() {
        let body = r#"{"jsonrpc":"2.0","id":7}"#;
        let input = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\ncontent-length: {}\r\n\r\n{body}",
            body.len()
        );
        let mut reader = MessageReader::new(input.as_bytes());
        assert_eq!(reader.read_message().await.unwrap().unwrap()["id"], 7);
    }

    #[tokio::test]
    async fn test_truncated_body_is_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 100\r\n\r\n{}"[..]);
        assert!(matches!(reader.read_message().await, Err(CodecError::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let bytes = frame("not json");
        let mut reader = MessageReader::new(bytes.as_slice());
        assert!(matches!(reader.read_message().await, Err(CodecError::Json(_))));
    }

    #[tokio::test]
    async fn test_written_length_counts_bytes() {
        let message = serde_json::json!({ "message": "Could not find Ünïcode" });
        let mut out = Vec::new();
        MessageWriter::new(&mut out)
            .write_message(&message)
            .await
            .unwrap();

        let body = serde_json::to_vec(&message).unwrap();
        let expected_header = format!("Content-Length: {}\r\n\r\n", body.len());
        assert!(out.starts_with(expected_header.as_bytes()));

        let mut reader = MessageReader::new(out.as_slice());
        assert_eq!(reader.read_message().await.unwrap().unwrap(), message);
    }
}
