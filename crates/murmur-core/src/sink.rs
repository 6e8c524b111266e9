//! Outbound stream abstraction.
//!
//! A delivery loop writes frames into a [`FrameSink`] supplied by the
//! transport. The first failed send ends the loop.

use async_trait::async_trait;
use murmur_protocol::Frame;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The peer went away.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The frame could not be encoded for the wire.
    #[error("Protocol error: {0}")]
    Protocol(#[from] murmur_protocol::ProtocolError),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// The sending half of a listen stream.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one frame to the client.
    async fn send(&mut self, frame: Arc<Frame>) -> Result<(), SinkError>;
}

/// In-process listener: frames go into a channel, and the stream ends when
/// the receiving side is dropped.
#[async_trait]
impl FrameSink for mpsc::Sender<Arc<Frame>> {
    async fn send(&mut self, frame: Arc<Frame>) -> Result<(), SinkError> {
        mpsc::Sender::send(self, frame)
            .await
            .map_err(|_| SinkError::ConnectionClosed)
    }
}
