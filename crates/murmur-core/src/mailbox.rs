//! Per-user bounded outbound queue.
//!
//! A mailbox is created once with its user record and lives as long as the
//! record does. Senders never wait: a full mailbox drops the frame.

use murmur_protocol::Frame;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Default mailbox capacity in frames.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 2048;

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The frame was queued.
    Queued,
    /// The mailbox was full and the frame was discarded.
    Dropped,
}

/// A bounded FIFO of frames for one user.
///
/// Cloning a mailbox clones the handle, not the queue: every clone enqueues
/// into the same buffer. The single receiving end sits behind an async mutex
/// so only one [`MailboxReader`] exists at a time.
#[derive(Debug, Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Arc<Frame>>,
    receiver: Arc<Mutex<mpsc::Receiver<Arc<Frame>>>>,
}

impl Mailbox {
    /// Create a mailbox with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAILBOX_CAPACITY)
    }

    /// Create a mailbox holding at most `capacity` frames (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Enqueue a frame without waiting.
    pub fn try_deliver(&self, frame: Arc<Frame>) -> Delivery {
        match self.sender.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(frame)) => {
                trace!(frame_type = ?frame.frame_type(), "Mailbox full, frame dropped");
                Delivery::Dropped
            }
            // Unreachable while `self` holds the receiver, kept total anyway.
            Err(TrySendError::Closed(_)) => Delivery::Dropped,
        }
    }

    /// Maximum number of queued frames.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Number of frames currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether two handles refer to the same queue.
    #[must_use]
    pub fn same_queue(&self, other: &Mailbox) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Take the receiving end, waiting for any current reader to finish.
    pub async fn open(&self) -> MailboxReader {
        MailboxReader {
            receiver: Arc::clone(&self.receiver).lock_owned().await,
        }
    }

    /// Take the receiving end if nobody else holds it.
    #[must_use]
    pub fn try_open(&self) -> Option<MailboxReader> {
        Arc::clone(&self.receiver)
            .try_lock_owned()
            .ok()
            .map(|receiver| MailboxReader { receiver })
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive receiving end of a [`Mailbox`].
///
/// Dropping the reader hands the queue back; undelivered frames stay queued.
#[derive(Debug)]
pub struct MailboxReader {
    receiver: OwnedMutexGuard<mpsc::Receiver<Arc<Frame>>>,
}

impl MailboxReader {
    /// Wait for the next frame. Cancel safe.
    pub async fn recv(&mut self) -> Option<Arc<Frame>> {
        self.receiver.recv().await
    }

    /// Take the next frame if one is queued.
    pub fn try_recv(&mut self) -> Option<Arc<Frame>> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(n: usize) -> Arc<Frame> {
        Arc::new(Frame::public("alice", n.to_string(), 0))
    }

    #[test]
    fn test_mailbox_creation() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.capacity(), DEFAULT_MAILBOX_CAPACITY);
        assert!(mailbox.is_empty());

        assert_eq!(Mailbox::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_full_mailbox_drops() {
        let mailbox = Mailbox::with_capacity(2);

        assert_eq!(mailbox.try_deliver(text(1)), Delivery::Queued);
        assert_eq!(mailbox.try_deliver(text(2)), Delivery::Queued);
        assert_eq!(mailbox.try_deliver(text(3)), Delivery::Dropped);
        assert_eq!(mailbox.len(), 2);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let mailbox = Mailbox::with_capacity(8);
        for i in 0..5 {
            mailbox.try_deliver(text(i));
        }

        let mut reader = mailbox.open().await;
        for i in 0..5 {
            assert_eq!(*reader.recv().await.unwrap(), *text(i));
        }
        assert!(reader.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_single_reader() {
        let mailbox = Mailbox::with_capacity(4);
        let clone = mailbox.clone();
        assert!(clone.same_queue(&mailbox));
        assert!(!Mailbox::new().same_queue(&mailbox));

        let reader = mailbox.open().await;
        assert!(clone.try_open().is_none());

        drop(reader);
        assert!(clone.try_open().is_some());
    }

    #[tokio::test]
    async fn test_frames_survive_reader() {
        let mailbox = Mailbox::with_capacity(4);
        mailbox.try_deliver(text(1));
        mailbox.try_deliver(text(2));

        {
            let mut reader = mailbox.open().await;
            assert_eq!(*reader.recv().await.unwrap(), *text(1));
        }

        let mut reader = mailbox.open().await;
        assert_eq!(*reader.recv().await.unwrap(), *text(2));
    }
}
