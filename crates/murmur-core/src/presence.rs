//! Login, logout and the online-user listing.
//!
//! Every online/offline transition is followed by a presence frame broadcast
//! to all listening clients.

use crate::error::{AuthFailure, ChatError};
use crate::mailbox::{Mailbox, DEFAULT_MAILBOX_CAPACITY};
use crate::router::MessageRouter;
use crate::store::UserStore;
use crate::user::{unix_timestamp, validate_nickname, User};
use murmur_protocol::{Credentials, Frame, PresenceKind, UserInfo};
use std::sync::Arc;
use tracing::{debug, info};

/// Presence transitions on top of the user store.
#[derive(Debug, Clone)]
pub struct PresenceCoordinator {
    store: Arc<UserStore>,
    router: MessageRouter,
    mailbox_capacity: usize,
}

impl PresenceCoordinator {
    /// Create a coordinator whose new users get the default mailbox capacity.
    #[must_use]
    pub fn new(router: MessageRouter) -> Self {
        Self::with_mailbox_capacity(router, DEFAULT_MAILBOX_CAPACITY)
    }

    #[must_use]
    pub fn with_mailbox_capacity(router: MessageRouter, mailbox_capacity: usize) -> Self {
        Self {
            store: Arc::clone(router.store()),
            router,
            mailbox_capacity,
        }
    }

    #[must_use]
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Log a nickname in, creating its record on first use.
    ///
    /// The returned credential is the nickname itself.
    ///
    /// # Errors
    ///
    /// - [`ChatError::InvalidNickname`] for a malformed nickname
    /// - [`AuthFailure::AlreadyOnline`] if the user is already online
    /// - [`ChatError::Internal`] if a concurrent login created the record first
    pub fn login(&self, nickname: &str) -> Result<Credentials, ChatError> {
        debug!(nickname = %nickname, "Login request");
        validate_nickname(nickname).map_err(ChatError::InvalidNickname)?;

        let existing = self.store.modify(nickname, |user| {
            if user.is_online() {
                return Err(AuthFailure::AlreadyOnline);
            }
            user.go_online();
            Ok(user.clone())
        });

        let user = match existing {
            Some(transition) => transition?,
            None => {
                let mut user = User::new(nickname, Mailbox::with_capacity(self.mailbox_capacity));
                user.go_online();
                self.store
                    .add(user.clone())
                    .map_err(|e| ChatError::Internal(e.to_string()))?;
                user
            }
        };

        self.announce(PresenceKind::Login, &user);
        info!(nickname = %nickname, "User logged in");

        Ok(Credentials::new(user.nickname()))
    }

    /// Log the credential's owner out.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the user is unknown or already offline.
    pub fn logout(&self, credentials: &Credentials) -> Result<(), ChatError> {
        debug!(nickname = %credentials.nickname, "Logout request");

        let transition = self
            .store
            .modify(&credentials.nickname, |user| {
                if !user.is_online() {
                    return Err(AuthFailure::NotLoggedIn);
                }
                user.go_offline();
                Ok(user.clone())
            })
            .ok_or(AuthFailure::UnknownUser)?;
        let user = transition?;

        self.announce(PresenceKind::Logout, &user);
        info!(nickname = %credentials.nickname, "User logged out");

        Ok(())
    }

    /// Online users sorted ascending by nickname.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the caller is unknown or offline.
    pub fn list_users(&self, credentials: &Credentials) -> Result<Vec<UserInfo>, ChatError> {
        debug!(nickname = %credentials.nickname, "List users request");
        self.store.check_credentials(credentials)?;

        let mut users = self.store.online_user_infos();
        users.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        Ok(users)
    }

    /// End a listen stream: mark `nickname` offline, drop its registry
    /// entry and announce the logout.
    ///
    /// The record goes offline before the entry is removed, so a listener
    /// racing this call is refused until the user logs in again. Returns
    /// `false` if there is no record.
    pub fn disconnect(&self, nickname: &str) -> bool {
        let user = self.store.modify(nickname, |user| {
            user.go_offline();
            user.clone()
        });
        self.router.registry().deregister(nickname);

        match user {
            Some(user) => {
                self.announce(PresenceKind::Logout, &user);
                true
            }
            None => false,
        }
    }

    fn announce(&self, kind: PresenceKind, user: &User) {
        let frame = Frame::presence(kind, user.info(), unix_timestamp());
        self.router.broadcast_all(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> PresenceCoordinator {
        PresenceCoordinator::new(MessageRouter::new(Arc::new(UserStore::new())))
    }

    #[tokio::test]
    async fn test_login_creates_online_user() {
        let presence = coordinator();

        let credentials = presence.login("alice").unwrap();
        assert_eq!(credentials, Credentials::new("alice"));

        let user = presence.router().store().get("alice").unwrap();
        assert!(user.is_online());
        assert!(user.mailbox().is_empty());
        assert_eq!(user.mailbox().capacity(), DEFAULT_MAILBOX_CAPACITY);
    }

    #[tokio::test]
    async fn test_login_twice_fails_without_change() {
        let presence = coordinator();
        presence.login("alice").unwrap();
        let before = presence.router().store().get("alice").unwrap();

        assert_eq!(
            presence.login("alice"),
            Err(ChatError::Authentication(AuthFailure::AlreadyOnline))
        );

        let after = presence.router().store().get("alice").unwrap();
        assert!(after.is_online());
        assert_eq!(after.last_seen(), before.last_seen());
        assert!(after.mailbox().same_queue(before.mailbox()));
    }

    #[tokio::test]
    async fn test_relogin_keeps_mailbox() {
        let presence = coordinator();
        presence.login("alice").unwrap();
        let first = presence.router().store().get("alice").unwrap();

        presence.logout(&Credentials::new("alice")).unwrap();
        presence.login("alice").unwrap();

        let second = presence.router().store().get("alice").unwrap();
        assert!(second.is_online());
        assert!(second.mailbox().same_queue(first.mailbox()));
        assert_eq!(presence.router().store().len(), 1);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_nickname() {
        let presence = coordinator();
        assert!(matches!(presence.login(""), Err(ChatError::InvalidNickname(_))));
        assert!(matches!(presence.login("a b"), Err(ChatError::InvalidNickname(_))));
        assert!(presence.router().store().is_empty());
    }

    #[tokio::test]
    async fn test_logout_failures() {
        let presence = coordinator();
        assert_eq!(
            presence.logout(&Credentials::new("ghost")),
            Err(ChatError::Authentication(AuthFailure::UnknownUser))
        );

        presence.login("alice").unwrap();
        presence.logout(&Credentials::new("alice")).unwrap();
        assert!(!presence.router().store().get("alice").unwrap().is_online());

        assert_eq!(
            presence.logout(&Credentials::new("alice")),
            Err(ChatError::Authentication(AuthFailure::NotLoggedIn))
        );
    }

    #[tokio::test]
    async fn test_list_users_sorted_online_only() {
        let presence = coordinator();
        for nickname in ["bob", "alice", "carol", "dave"] {
            presence.login(nickname).unwrap();
        }
        presence.logout(&Credentials::new("dave")).unwrap();

        let users = presence.list_users(&Credentials::new("bob")).unwrap();
        let names: Vec<_> = users.iter().map(|u| u.nickname.as_str()).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
        assert!(users.iter().all(|u| u.last_seen > 0));

        assert_eq!(
            presence.list_users(&Credentials::new("dave")),
            Err(ChatError::Authentication(AuthFailure::NotLoggedIn))
        );
    }

    #[tokio::test]
    async fn test_login_announces_to_listeners() {
        let presence = coordinator();
        let watcher = Mailbox::with_capacity(4);
        presence.router().registry().register("watcher", watcher.clone());

        presence.login("alice").unwrap();

        let mut reader = watcher.open().await;
        match reader.recv().await.as_deref() {
            Some(Frame::Presence { kind, user, .. }) => {
                assert_eq!(*kind, PresenceKind::Login);
                assert_eq!(user.nickname, "alice");
            }
            other => panic!("Expected presence frame, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_login_single_record() {
        let presence = coordinator();

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let presence = presence.clone();
                tokio::spawn(async move { presence.login("alice").is_ok() })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(presence.router().store().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect() {
        let presence = coordinator();
        presence.login("alice").unwrap();
        presence
            .router()
            .registry()
            .register("alice", Mailbox::with_capacity(4));

        assert!(presence.disconnect("alice"));
        assert!(!presence.router().store().get("alice").unwrap().is_online());
        assert!(!presence.router().registry().contains("alice"));
        assert!(!presence.disconnect("ghost"));
    }

    #[test]
    fn test_presence_works_without_runtime() {
        let presence = coordinator();
        let watcher = Mailbox::with_capacity(4);
        presence.router().registry().register("watcher", watcher.clone());

        let credentials = presence.login("alice").unwrap();
        assert_eq!(credentials, Credentials::new("alice"));
        presence.logout(&credentials).unwrap();

        // Both announcements were delivered inline
        assert_eq!(watcher.len(), 2);
    }
}
