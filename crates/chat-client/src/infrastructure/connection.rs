//! TCP connection from the client to the chat server.
//!
//! [`ServerConnection`] owns both halves of the stream.  Before login it is
//! used as one object; afterwards [`ServerConnection::into_split`] hands the
//! read half to a task that prints pushed frames while the write half keeps
//! sending the user's commands.
//!
//! Frames are read the same way the server reads them: the 8-byte header
//! first, then exactly `total_length - 8` more bytes.

use std::io;

use chat_core::{
    decode_header, decode_response, encode_request, ProtocolError, Request, Response,
    ResponseType, SessionToken, StatusCode, HEADER_SIZE,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

/// Errors that can occur on the client connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connection to the server failed.
    #[error("failed to connect to server at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[source] io::Error),

    /// A frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,

    /// The server answered LOGIN with a failure status.
    #[error("login refused: {}", .0.description())]
    Refused(StatusCode),

    /// A frame arrived that does not answer the request just sent.
    #[error("unexpected {0:?} frame from server")]
    UnexpectedResponse(ResponseType),
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => ClientError::Closed,
            _ => ClientError::Io(e),
        }
    }
}

// ── Read half ─────────────────────────────────────────────────────────────────

/// Reads and decodes response frames.
pub struct ResponseReader<R = OwnedReadHalf> {
    inner: R,
}

impl<R: AsyncRead + Unpin> ResponseReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next complete frame from the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] if the server hangs up (even mid-frame)
    /// and [`ClientError::Protocol`] if the frame does not decode.
    pub async fn read_response(&mut self) -> Result<Response, ClientError> {
        let mut frame = vec![0u8; HEADER_SIZE];
        self.inner.read_exact(&mut frame).await?;

        let header = decode_header(&frame)?;
        frame.resize(usize::from(header.total_length), 0);
        self.inner.read_exact(&mut frame[HEADER_SIZE..]).await?;

        let (response, _) = decode_response(&frame)?;
        debug!("received {:?}", response.response_type());
        Ok(response)
    }
}

// ── Write half ────────────────────────────────────────────────────────────────

/// Encodes and sends request frames, stamping each with the session token.
pub struct RequestWriter<W = OwnedWriteHalf> {
    inner: W,
    token: SessionToken,
}

impl<W: AsyncWrite + Unpin> RequestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, token: 0 }
    }

    /// Token put in the header of every non-LOGIN request (`0` before login).
    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn set_token(&mut self, token: SessionToken) {
        self.token = token;
    }

    /// Sends one request.  LOGIN always carries token `0`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] if the request cannot be encoded (for
    /// example, a name longer than the wire limit) and an I/O error if the
    /// write fails.
    pub async fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        let token = match request {
            Request::Login { .. } => 0,
            _ => self.token,
        };
        let bytes = encode_request(token, request)?;
        self.send_raw(&bytes).await
    }

    /// Writes pre-encoded bytes as-is.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shuts down the write direction of the stream.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

// ── Whole connection ──────────────────────────────────────────────────────────

/// Both halves of a connection to the server.
pub struct ServerConnection<R = OwnedReadHalf, W = OwnedWriteHalf> {
    reader: ResponseReader<R>,
    writer: RequestWriter<W>,
}

impl ServerConnection {
    /// Opens a TCP connection to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectFailed`] if the server cannot be reached.
    pub async fn connect(host: &str, port: u16) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| ClientError::ConnectFailed {
                addr: format!("{host}:{port}"),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY: {e}");
        }

        let (read_half, write_half) = stream.into_split();
        Ok(Self::from_parts(read_half, write_half))
    }
}

impl<R, W> ServerConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wraps an already-open reader and writer.
    pub fn from_parts(reader: R, writer: W) -> Self {
        Self {
            reader: ResponseReader::new(reader),
            writer: RequestWriter::new(writer),
        }
    }

    /// Logs in as `name` and remembers the token the server assigns.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Refused`] with the server's status (for example
    /// `NameTaken`) if the login is rejected.
    pub async fn login(&mut self, name: &str) -> Result<SessionToken, ClientError> {
        self.writer
            .send(&Request::Login {
                name: name.to_string(),
            })
            .await?;

        match self.reader.read_response().await? {
            Response::Login { token } => {
                self.writer.set_token(token);
                Ok(token)
            }
            Response::Failure { status, .. } => Err(ClientError::Refused(status)),
            other => Err(ClientError::UnexpectedResponse(other.response_type())),
        }
    }

    /// The session token, or `0` before login.
    pub fn token(&self) -> SessionToken {
        self.writer.token()
    }

    pub async fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        self.writer.send(request).await
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.writer.send_raw(bytes).await
    }

    pub async fn read_response(&mut self) -> Result<Response, ClientError> {
        self.reader.read_response().await
    }

    /// Separates the halves so reading and writing can proceed independently.
    pub fn into_split(self) -> (ResponseReader<R>, RequestWriter<W>) {
        (self.reader, self.writer)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
