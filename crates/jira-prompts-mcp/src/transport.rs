//! Transport layer for MCP JSON-RPC communication.
//!
//! MCP uses newline-delimited JSON over stdin/stdout. Nothing else may be
//! written to stdout while the server runs.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Message that can be received from the client.
#[derive(Debug)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    /// A line that is not a JSON-RPC message; answered with a parse error
    Malformed(String),
}

/// Transport for reading/writing JSON-RPC messages.
pub struct StdioTransport {
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
}

impl StdioTransport {
    /// Create a transport using stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(
            Box::new(BufReader::new(tokio::io::stdin())),
            Box::new(tokio::io::stdout()),
        )
    }

    /// Create a transport with a custom reader/writer.
    pub fn new(
        reader: Box<dyn AsyncBufRead + Unpin + Send>,
        writer: Box<dyn AsyncWrite + Unpin + Send>,
    ) -> Self {
        Self { reader, writer }
    }

    /// Read the next message. Blank lines are skipped; `None` means EOF.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, so such a line comes
    /// back as [`IncomingMessage::Malformed`].
    pub async fn read_message(&mut self) -> io::Result<Option<IncomingMessage>> {
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            if self.reader.read_until(b'\n', &mut buffer).await? == 0 {
                return Ok(None);
            }

            let text = String::from_utf8_lossy(&buffer);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }

            tracing::debug!("Received: {}", line);
            return Ok(Some(parse_message(line)));
        }
    }

    /// Write a JSON-RPC response to the transport.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("Serialization error: {}", e))
        })?;

        tracing::debug!("Sending: {}", json);

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

fn parse_message(line: &str) -> IncomingMessage {
    // Requests carry an id, notifications don't
    if let Ok(request) = serde_json::from_str::<JsonRpcRequest>(line) {
        return IncomingMessage::Request(request);
    }

    if let Ok(notification) = serde_json::from_str::<JsonRpcNotification>(line) {
        return IncomingMessage::Notification(notification);
    }

    tracing::warn!("Failed to parse message: {}", line);
    IncomingMessage::Malformed(line.to_string())
}
