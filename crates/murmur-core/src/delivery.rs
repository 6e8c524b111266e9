//! Per-connection delivery loop.
//!
//! A listen stream goes through three stages:
//!
//! 1. **Registering** - the credential must name an online user; the user's
//!    mailbox is entered into the connected registry.
//! 2. **Serving** - frames from the mailbox and periodic heartbeats are
//!    forwarded to the sink, whichever is ready first.
//! 3. **Terminating** - on the first failed send the user goes offline, the
//!    nickname is deregistered and a logout is announced.
//!
//! Termination is tied to a drop guard, so it also runs if the future is
//! dropped mid-stream.

use crate::error::{AuthFailure, ChatError};
use crate::mailbox::{Mailbox, MailboxReader};
use crate::presence::PresenceCoordinator;
use crate::sink::{FrameSink, SinkError};
use crate::user::User;
use murmur_protocol::{Credentials, Frame};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// What a finished listen stream did.
#[derive(Debug)]
pub struct SessionSummary {
    pub nickname: String,
    /// Mailbox frames forwarded.
    pub frames: u64,
    /// Heartbeats forwarded.
    pub heartbeats: u64,
    /// The send failure that ended the stream.
    pub reason: SinkError,
}

/// Runs listen streams.
#[derive(Debug, Clone)]
pub struct DeliveryLoop {
    presence: PresenceCoordinator,
    heartbeat_interval: Duration,
}

impl DeliveryLoop {
    #[must_use]
    pub fn new(presence: PresenceCoordinator) -> Self {
        Self::with_heartbeat_interval(presence, DEFAULT_HEARTBEAT_INTERVAL)
    }

    #[must_use]
    pub fn with_heartbeat_interval(presence: PresenceCoordinator, heartbeat_interval: Duration) -> Self {
        Self {
            presence,
            heartbeat_interval,
        }
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Stream frames for the credential's owner into `sink` until a send fails.
    ///
    /// Cleanup has completed by the time this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the user is unknown, offline, or
    /// already has a listen stream. No state is changed in that case.
    pub async fn run<S: FrameSink>(
        &self,
        credentials: &Credentials,
        mut sink: S,
    ) -> Result<SessionSummary, ChatError> {
        let session = self.register(credentials)?;
        let mut reader = session.mailbox.open().await;

        info!(nickname = %session.nickname, "Serving messages");
        let summary = self.serve(&session.nickname, &mut reader, &mut sink).await;

        drop(reader);
        drop(session);

        info!(
            nickname = %summary.nickname,
            frames = summary.frames,
            heartbeats = summary.heartbeats,
            reason = %summary.reason,
            "Exited message loop"
        );
        Ok(summary)
    }

    fn register(&self, credentials: &Credentials) -> Result<Session<'_>, ChatError> {
        debug!(nickname = %credentials.nickname, "Listen for messages request");
        let router = self.presence.router();
        let user = router.store().check_credentials(credentials)?;

        if !router.registry().register(user.nickname(), user.mailbox().clone()) {
            return Err(AuthFailure::AlreadyListening.into());
        }
        router.store().modify(user.nickname(), User::mark_online);

        Ok(Session {
            delivery: self,
            nickname: user.nickname().to_string(),
            mailbox: user.mailbox().clone(),
        })
    }

    async fn serve<S: FrameSink>(
        &self,
        nickname: &str,
        reader: &mut MailboxReader,
        sink: &mut S,
    ) -> SessionSummary {
        let period = self.heartbeat_interval;
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let beat = Arc::new(Frame::heartbeat());

        let mut frames = 0;
        let mut heartbeats = 0;

        loop {
            let frame = tokio::select! {
                Some(frame) = reader.recv() => frame,
                _ = heartbeat.tick() => Arc::clone(&beat),
            };
            let is_heartbeat = frame.is_heartbeat();

            if let Err(reason) = sink.send(frame).await {
                debug!(nickname = %nickname, error = %reason, "Send failed, terminating stream");
                return SessionSummary {
                    nickname: nickname.to_string(),
                    frames,
                    heartbeats,
                    reason,
                };
            }

            if is_heartbeat {
                heartbeats += 1;
            } else {
                frames += 1;
                trace!(nickname = %nickname, "Frame forwarded");
            }
        }
    }

    fn terminate(&self, nickname: &str) {
        if !self.presence.disconnect(nickname) {
            warn!(nickname = %nickname, "User record missing during stream cleanup");
        }
    }
}

/// Registry entry owned by a running stream; dropping it runs termination.
struct Session<'a> {
    delivery: &'a DeliveryLoop,
    nickname: String,
    mailbox: Mailbox,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.delivery.terminate(&self.nickname);
    }
}
