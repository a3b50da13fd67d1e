//! Line-delimited stdio transport.
//!
//! Reads one message per line from stdin and writes one JSON object per
//! line to stdout. Stdout purity is the transport's core invariant:
//! nothing else in the process may write there, and every write here is
//! exactly one serialised response followed by a newline and a flush.
//! Diagnostics of any kind belong on stderr.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse};

/// The stdio transport.
pub struct StdioTransport {
    reader: BufReader<Stdin>,
    writer: Stdout,
}

impl StdioTransport {
    /// Wraps the process's stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }

    /// Reads the next line, or `None` on EOF.
    ///
    /// # Errors
    ///
    /// Returns an error when stdin itself fails.
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Writes one success response as a single line.
    ///
    /// # Errors
    ///
    /// Returns an error when stdout fails.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> std::io::Result<()> {
        let rendered = serde_json::to_string(response).map_err(std::io::Error::other)?;
        self.write_line(&rendered).await
    }

    /// Writes one error response as a single line.
    ///
    /// # Errors
    ///
    /// Returns an error when stdout fails.
    pub async fn write_error(&mut self, error: &JsonRpcError) -> std::io::Result<()> {
        let rendered = serde_json::to_string(error).map_err(std::io::Error::other)?;
        self.write_line(&rendered).await
    }

    async fn write_line(&mut self, rendered: &str) -> std::io::Result<()> {
        self.writer.write_all(rendered.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}
