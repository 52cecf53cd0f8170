//! Connection channel: whole-frame reads and writes over one TCP connection.
//!
//! # Framing over a byte stream
//!
//! TCP delivers a stream of bytes, not messages.  A single `read()` may return
//! half a header or three frames at once.  [`ChannelReader::read_frame`] hides
//! this: it reads exactly the 8-byte header, validates the length field, then
//! reads exactly the rest of the frame.  `read_exact` loops internally, so the
//! caller never sees a partial frame.
//!
//! # Shared writer
//!
//! A client's write half is written to by its own handler (direct replies)
//! and by every other handler that forwards a message to it.  The
//! [`ChannelWriter`] wraps the half in a `tokio::sync::Mutex` so whole frames
//! are written one at a time and never interleave, and bounds each write with
//! a timeout so a client that stopped reading cannot stall its senders.
//!
//! A write that fails or times out may have put part of a frame on the wire,
//! after which the peer can no longer find frame boundaries.  The writer is
//! therefore poisoned on the first failure: it is marked closed, the socket
//! is shut down, and [`ChannelWriter::closed`] resolves so the connection's
//! own task stops reading and deregisters the session.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chat_core::{decode_header, ProtocolError, HEADER_SIZE};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

use crate::application::delivery::{DeliveryError, FrameSink};

/// Error type for reading frames from a connection.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The peer closed the connection, possibly in the middle of a frame.
    #[error("connection closed by peer")]
    Closed,

    /// The transport failed.
    #[error("transport error: {0}")]
    Io(#[source] io::Error),

    /// No complete frame arrived within the idle timeout.
    #[error("no frame received within {0:?}")]
    IdleTimeout(Duration),

    /// The header's length field is out of range.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<io::Error> for ChannelError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => ChannelError::Closed,
            _ => ChannelError::Io(e),
        }
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Reads complete frames from the inbound half of a connection.
pub struct ChannelReader<R> {
    inner: R,
    idle_timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> ChannelReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            idle_timeout: None,
        }
    }

    /// Fails [`read_frame`](Self::read_frame) if a whole frame takes longer
    /// than `limit` to arrive.  `None` waits forever.
    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle_timeout = limit;
        self
    }

    /// Reads exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Closed`] if the stream ends first; [`ChannelError::Io`]
    /// for any other transport failure.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ChannelError> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Reads one complete frame (header and body) and returns its bytes.
    ///
    /// Only the length field is validated here; the caller decodes the frame.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Protocol`] if the length field is below the header
    /// size or above the frame limit, [`ChannelError::IdleTimeout`] if the
    /// idle timeout expires, otherwise as for [`read_exact`](Self::read_exact).
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, ChannelError> {
        match self.idle_timeout {
            Some(limit) => timeout(limit, self.read_frame_inner())
                .await
                .map_err(|_| ChannelError::IdleTimeout(limit))?,
            None => self.read_frame_inner().await,
        }
    }

    async fn read_frame_inner(&mut self) -> Result<Vec<u8>, ChannelError> {
        let mut frame = self.read_exact(HEADER_SIZE).await?;
        let header = decode_header(&frame)?;
        let body = self.read_exact(header.body_length()).await?;
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Writes complete frames to the outbound half of a connection.
pub struct ChannelWriter<W> {
    inner: Mutex<W>,
    write_timeout: Duration,
    closed: AtomicBool,
    closed_signal: Notify,
}

impl<W: AsyncWrite + Unpin + Send> ChannelWriter<W> {
    pub fn new(inner: W, write_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(inner),
            write_timeout,
            closed: AtomicBool::new(false),
            closed_signal: Notify::new(),
        }
    }

    /// Writes every byte of `bytes` and flushes.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Closed`] after [`shutdown`](Self::shutdown) or an
    /// earlier failed write, [`DeliveryError::Timeout`] if the write does not
    /// finish in time, and [`DeliveryError::Io`] if the transport fails.  After
    /// a timeout or I/O error the writer is closed for good.
    pub async fn write_all(&self, bytes: &[u8]) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }

        let mut guard = self.inner.lock().await;
        // Another sender may have failed while we waited for the lock.
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }

        let write = async {
            guard.write_all(bytes).await?;
            guard.flush().await?;
            Ok::<(), io::Error>(())
        };
        let outcome = match timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryError::Io(e)),
            Err(_) => Err(DeliveryError::Timeout(self.write_timeout)),
        };

        if outcome.is_err() {
            self.mark_closed();
            let _ = timeout(self.write_timeout, guard.shutdown()).await;
        }
        outcome
    }

    /// Shuts down the write half.  Later writes fail immediately.
    pub async fn shutdown(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.mark_closed();
        let mut guard = self.inner.lock().await;
        // Best effort: the peer may already be gone.
        let _ = timeout(self.write_timeout, guard.shutdown()).await;
    }

    /// Returns `true` once the writer has been shut down or a write failed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the writer is closed, immediately if it already is.
    pub async fn closed(&self) {
        loop {
            let notified = self.closed_signal.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        self.closed_signal.notify_waiters();
    }
}

#[async_trait]
impl<W> FrameSink for ChannelWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send_frame(&self, frame: &[u8]) -> Result<(), DeliveryError> {
        self.write_all(frame).await
    }

    async fn close(&self) {
        self.shutdown().await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::{encode_request, encode_response, Request, Response};
    use tokio_test::io::Builder;

    fn yell_frame() -> Vec<u8> {
        encode_request(
            7,
            &Request::Yell {
                message: "hello everyone".to_string(),
            },
        )
        .unwrap()
    }

    // ── Reader ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_read_frame_assembles_partial_reads() {
        // Arrange: the frame trickles in across three reads
        let frame = yell_frame();
        let mock = Builder::new()
            .read(&frame[..3])
            .read(&frame[3..10])
            .read(&frame[10..])
            .build();
        let mut reader = ChannelReader::new(mock);

        // Act
        let read = reader.read_frame().await.unwrap();

        // Assert
        assert_eq!(read, frame);
    }

    #[tokio::test]
    async fn test_read_frame_splits_coalesced_frames() {
        let first = yell_frame();
        let second = encode_request(7, &Request::Show).unwrap();
        let mut both = first.clone();
        both.extend_from_slice(&second);
        let mock = Builder::new().read(&both).build();
        let mut reader = ChannelReader::new(mock);

        assert_eq!(reader.read_frame().await.unwrap(), first);
        assert_eq!(reader.read_frame().await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_read_frame_on_clean_eof_is_closed() {
        let mut reader = ChannelReader::new(Builder::new().build());

        let result = reader.read_frame().await;

        assert!(matches!(result, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_read_frame_on_eof_mid_body_is_closed() {
        let frame = yell_frame();
        let mock = Builder::new().read(&frame[..HEADER_SIZE + 2]).build();
        let mut reader = ChannelReader::new(mock);

        let result = reader.read_frame().await;

        assert!(matches!(result, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_read_frame_rejects_zero_length_field() {
        let mock = Builder::new().read(&[0, 2, 0, 0, 0, 0, 0, 1]).build();
        let mut reader = ChannelReader::new(mock);

        let result = reader.read_frame().await;

        assert!(matches!(
            result,
            Err(ChannelError::Protocol(ProtocolError::MalformedFrame(_)))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_surfaces_transport_errors() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::Other, "boom"))
            .build();
        let mut reader = ChannelReader::new(mock);

        let result = reader.read_frame().await;

        assert!(matches!(result, Err(ChannelError::Io(_))));
    }

    #[tokio::test]
    async fn test_read_frame_connection_reset_is_closed() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = ChannelReader::new(mock);

        assert!(matches!(reader.read_frame().await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_read_frame_idle_timeout() {
        // Arrange: the peer end of the pipe stays open but silent
        let (_peer, local) = tokio::io::duplex(64);
        let mut reader =
            ChannelReader::new(local).with_idle_timeout(Some(Duration::from_millis(20)));

        // Act
        let result = reader.read_frame().await;

        // Assert
        assert!(matches!(result, Err(ChannelError::IdleTimeout(_))));
    }

    #[tokio::test]
    async fn test_read_exact_returns_requested_bytes() {
        let mock = Builder::new().read(b"ab").read(b"cdef").build();
        let mut reader = ChannelReader::new(mock);

        assert_eq!(reader.read_exact(4).await.unwrap(), b"abcd".to_vec());
        assert_eq!(reader.read_exact(2).await.unwrap(), b"ef".to_vec());
    }

    // ── Writer ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_send_frame_writes_all_bytes() {
        let frame = encode_response(&Response::Exit).unwrap();
        let mock = Builder::new().write(&frame).build();
        let writer = ChannelWriter::new(mock, Duration::from_secs(1));

        writer.send_frame(&frame).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_close_is_closed() {
        let writer = ChannelWriter::new(Builder::new().build(), Duration::from_secs(1));

        writer.close().await;
        let result = writer.send_frame(&[0u8; HEADER_SIZE]).await;

        assert!(matches!(result, Err(DeliveryError::Closed)));
    }

    #[tokio::test]
    async fn test_send_frame_times_out_when_peer_stops_reading() {
        // Arrange: an 8-byte pipe nobody drains
        let (_peer, local) = tokio::io::duplex(8);
        let writer = ChannelWriter::new(local, Duration::from_millis(20));

        // Act
        let result = writer.send_frame(&[1u8; 64]).await;

        // Assert
        assert!(matches!(result, Err(DeliveryError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_timed_out_write_closes_writer_and_socket() {
        // Arrange: an 8-byte pipe nobody drains, so the frame is cut short
        let (mut peer, local) = tokio::io::duplex(8);
        let writer = ChannelWriter::new(local, Duration::from_millis(20));
        let notice = encode_response(&Response::ExitNotice {
            name: "a-rather-long-name".to_string(),
        })
        .unwrap();

        // Act
        let first = writer.send_frame(&notice).await;
        let second = writer.send_frame(&encode_response(&Response::Exit).unwrap()).await;

        // Assert: nothing follows the partial frame, and the stream ends
        assert!(matches!(first, Err(DeliveryError::Timeout(_))));
        assert!(matches!(second, Err(DeliveryError::Closed)));
        assert!(writer.is_closed());
        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, notice[..8].to_vec());
    }

    #[tokio::test]
    async fn test_failed_write_wakes_closed_waiter() {
        // Arrange
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let writer = std::sync::Arc::new(ChannelWriter::new(mock, Duration::from_secs(1)));
        let waiter = tokio::spawn({
            let writer = writer.clone();
            async move { writer.closed().await }
        });
        tokio::task::yield_now().await;

        // Act
        let result = writer.send_frame(b"abc").await;

        // Assert
        assert!(matches!(result, Err(DeliveryError::Io(_))));
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("closed() should resolve after a failed write")
            .unwrap();
        assert!(matches!(
            writer.send_frame(b"abc").await,
            Err(DeliveryError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_closed_stays_pending_while_healthy() {
        let (_peer, local) = tokio::io::duplex(64);
        let writer = ChannelWriter::new(local, Duration::from_secs(1));

        writer.send_frame(b"ok").await.unwrap();

        assert!(timeout(Duration::from_millis(20), writer.closed())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_send_frame_surfaces_write_errors() {
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let writer = ChannelWriter::new(mock, Duration::from_secs(1));

        let result = writer.send_frame(b"abc").await;

        assert!(matches!(result, Err(DeliveryError::Io(_))));
    }

    #[tokio::test]
    async fn test_concurrent_senders_never_interleave() {
        // Arrange
        let (mut peer, local) = tokio::io::duplex(4096);
        let writer = std::sync::Arc::new(ChannelWriter::new(local, Duration::from_secs(1)));
        let a = vec![b'a'; 1000];
        let b = vec![b'b'; 1000];

        // Act
        let (wa, wb) = (writer.clone(), writer.clone());
        let (ra, rb) = tokio::join!(
            tokio::spawn({
                let a = a.clone();
                async move { wa.send_frame(&a).await }
            }),
            tokio::spawn({
                let b = b.clone();
                async move { wb.send_frame(&b).await }
            })
        );
        ra.unwrap().unwrap();
        rb.unwrap().unwrap();
        let mut received = vec![0u8; 2000];
        peer.read_exact(&mut received).await.unwrap();

        // Assert: each 1000-byte block arrives contiguous
        let (first, second) = received.split_at(1000);
        assert!(first.iter().all(|&c| c == first[0]));
        assert!(second.iter().all(|&c| c == second[0]));
        assert_ne!(first[0], second[0]);
    }
}
