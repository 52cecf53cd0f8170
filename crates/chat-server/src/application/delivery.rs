//! Outbound delivery: the [`FrameSink`] seam and multi-recipient fan-out.
//!
//! Every session owns exactly one sink (its connection's write half).  Other
//! handlers push forwarded frames into that same sink, so implementations must
//! serialise concurrent writers themselves.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_core::{encode_response, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::application::session_registry::Session;

/// Error type for pushing a frame to one recipient.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The recipient's channel has already been shut down.
    #[error("recipient channel is closed")]
    Closed,

    /// The transport did not accept the frame within the write timeout.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed while writing.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for writing complete encoded frames to one connected client.
///
/// Infrastructure implementations write to a TCP stream; test implementations
/// record calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Writes one complete frame.  Either every byte is accepted or an error
    /// is returned; partial frames are never reported as success.
    async fn send_frame(&self, frame: &[u8]) -> Result<(), DeliveryError>;

    /// Shuts the channel down.  Later sends fail with [`DeliveryError::Closed`].
    async fn close(&self);
}

/// Shared handle to a session's outbound channel.
pub type SharedSink = Arc<dyn FrameSink>;

/// Pushes `response` to every session in `targets`, in order.
///
/// The frame is encoded once.  A failure for one recipient is logged and
/// skipped; it never stops delivery to the rest.  Returns the number of
/// recipients that accepted the frame.
pub async fn fan_out(targets: &[Session], response: &Response) -> usize {
    if targets.is_empty() {
        return 0;
    }

    let frame = match encode_response(response) {
        Ok(frame) => frame,
        Err(e) => {
            error!("cannot encode {:?} for fan-out: {e}", response.response_type());
            return 0;
        }
    };

    let mut delivered = 0;
    for target in targets {
        match target.channel.send_frame(&frame).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(
                "skipping {:?} to '{}': {e}",
                response.response_type(),
                target.name
            ),
        }
    }
    delivered
}

/// Pushes `response` to a single session, logging (not returning) a failure.
pub async fn deliver(target: &Session, response: &Response) -> bool {
    fan_out(std::slice::from_ref(target), response).await == 1
}
