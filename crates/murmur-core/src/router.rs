//! Message routing.
//!
//! The router owns the registry of listening clients and fans frames out to
//! their mailboxes. Every enqueue is a non-blocking try; a full mailbox loses
//! the frame for that recipient and nothing else.

use crate::error::ChatError;
use crate::mailbox::{Delivery, Mailbox};
use crate::registry::ConnectedRegistry;
use crate::store::UserStore;
use crate::user::unix_timestamp;
use murmur_protocol::{Credentials, Frame};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Result of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Mailboxes the frame was queued into.
    pub delivered: usize,
    /// Mailboxes that were full.
    pub dropped: usize,
}

/// Router statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Clients currently listening.
    pub listeners: usize,
    /// Frames queued since start.
    pub delivered: u64,
    /// Frames dropped on full mailboxes since start.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn record(&self, delivery: Delivery) {
        match delivery {
            Delivery::Queued => self.delivered.fetch_add(1, Ordering::Relaxed),
            Delivery::Dropped => self.dropped.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// The central message router.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    store: Arc<UserStore>,
    registry: ConnectedRegistry,
    counters: Arc<Counters>,
}

impl MessageRouter {
    #[must_use]
    pub fn new(store: Arc<UserStore>) -> Self {
        Self {
            store,
            registry: ConnectedRegistry::new(),
            counters: Arc::default(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<UserStore> {
        &self.store
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectedRegistry {
        &self.registry
    }

    #[must_use]
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            listeners: self.registry.len(),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Try-enqueue into one mailbox, counting the outcome.
    fn deliver(&self, mailbox: &Mailbox, frame: Arc<Frame>) -> Delivery {
        let delivery = mailbox.try_deliver(frame);
        self.counters.record(delivery);
        delivery
    }

    /// Offer `frame` to every client listening right now.
    ///
    /// This is the synchronous body of [`broadcast_all`](Self::broadcast_all).
    pub fn deliver_to_all(&self, frame: Arc<Frame>) -> FanOut {
        let mut fan_out = FanOut::default();
        for mailbox in self.registry.snapshot() {
            match self.deliver(&mailbox, Arc::clone(&frame)) {
                Delivery::Queued => fan_out.delivered += 1,
                Delivery::Dropped => fan_out.dropped += 1,
            }
        }
        trace!(
            frame_type = ?frame.frame_type(),
            delivered = fan_out.delivered,
            dropped = fan_out.dropped,
            "Fan-out complete"
        );
        fan_out
    }

    /// Fan `frame` out on a background task.
    ///
    /// The caller does not wait; the handle may be dropped to detach.
    /// Outside a tokio runtime the fan-out runs inline and `None` is returned.
    pub fn broadcast_all(&self, frame: Frame) -> Option<JoinHandle<FanOut>> {
        let frame = Arc::new(frame);
        match Handle::try_current() {
            Ok(handle) => {
                let router = self.clone();
                Some(handle.spawn(async move { router.deliver_to_all(frame) }))
            }
            Err(_) => {
                self.deliver_to_all(frame);
                None
            }
        }
    }

    /// Broadcast a public message from the credential's owner.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the sender is unknown or offline.
    pub fn send_public(&self, credentials: &Credentials, text: &str) -> Result<(), ChatError> {
        debug!(nickname = %credentials.nickname, "Send public message request");
        let sender = self.store.check_credentials(credentials)?;

        let frame = Frame::public(sender.nickname(), text, unix_timestamp());
        self.broadcast_all(frame);
        Ok(())
    }

    /// Send a private message to `to`.
    ///
    /// A listening recipient gets the frame through its live handle; a known
    /// but idle recipient gets it in the stored mailbox for later. The
    /// returned [`Delivery`] is informational only and is not meant for the
    /// sender.
    ///
    /// # Errors
    ///
    /// Returns an authentication error for a bad sender, or
    /// [`ChatError::NotFound`] if `to` has never logged in.
    pub fn send_private(
        &self,
        credentials: &Credentials,
        to: &str,
        text: &str,
    ) -> Result<Delivery, ChatError> {
        debug!(nickname = %credentials.nickname, to = %to, "Send private message request");
        let sender = self.store.check_credentials(credentials)?;
        let frame = Arc::new(Frame::private(to, sender.nickname(), text, unix_timestamp()));

        if let Some(mailbox) = self.registry.get(to) {
            return Ok(self.deliver(&mailbox, frame));
        }

        let recipient = self
            .store
            .get(to)
            .ok_or_else(|| ChatError::NotFound(to.to_string()))?;
        let delivery = self.deliver(recipient.mailbox(), frame);
        trace!(to = %to, ?delivery, "Queued private message for idle recipient");
        Ok(delivery)
    }
}
