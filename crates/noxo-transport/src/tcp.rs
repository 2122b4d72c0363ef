//! TCP listener and line-framed connection halves.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::{ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP listener handing out line-framed connections.
pub struct TcpLineListener {
    listener: TcpListener,
}

impl TcpLineListener {
    /// Binds to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }

    /// Waits for and accepts the next incoming connection.
    pub async fn accept(&self) -> Result<LineConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted connection");
        Ok(LineConnection { id, stream })
    }

    /// The local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single accepted connection, not yet split.
pub struct LineConnection {
    id: ConnectionId,
    stream: TcpStream,
}

impl LineConnection {
    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Splits into an owned reader/writer pair so reading and writing
    /// can run in separate tasks. Dropping both halves closes the
    /// socket; dropping the writer alone half-closes it.
    pub fn into_split(self) -> (LineReader, LineWriter) {
        let (read, write) = self.stream.into_split();
        (
            LineReader {
                inner: BufReader::new(read),
            },
            LineWriter { inner: write },
        )
    }
}

/// The read half: buffered, one line per call.
pub struct LineReader {
    inner: BufReader<OwnedReadHalf>,
}

impl LineReader {
    /// Reads the next line, including its terminator.
    ///
    /// Returns `Ok(None)` when the peer closed the connection.
    pub async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        let mut line = String::new();
        let n = self
            .inner
            .read_line(&mut line)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// The write half: one line per call, written as a single chunk.
pub struct LineWriter {
    inner: OwnedWriteHalf,
}

impl LineWriter {
    /// Writes one already-terminated line.
    pub async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.inner
            .write_all(line.as_bytes())
            .await
            .map_err(TransportError::SendFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_accept_and_read_lines() {
        let listener = TcpLineListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"##PING|\n##QUIT|\n").await.unwrap();
        });

        let conn = listener.accept().await.unwrap();
        let (mut reader, _writer) = conn.into_split();
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("##PING|\n"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("##QUIT|\n"));
        client.await.unwrap();
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_line_reaches_peer() {
        let listener = TcpLineListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let conn = listener.accept().await.unwrap();
        let (_reader, mut writer) = conn.into_split();
        writer.write_line("##HELLO|\n").await.unwrap();
        drop(writer);
        drop(_reader);

        assert_eq!(client.await.unwrap(), b"##HELLO|\n");
    }
}
