//! Thread-safe user repository.
//!
//! Records are keyed by nickname in a sharded map: reads of a shard run in
//! parallel, writes to it are exclusive. Callers only ever see clones.

use crate::error::AuthFailure;
use crate::user::User;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use murmur_protocol::{Credentials, UserInfo};
use thiserror::Error;
use tracing::debug;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A record with this nickname exists.
    #[error("user {0:?} already exists")]
    AlreadyExists(String),
}

/// In-memory user storage.
#[derive(Debug, Default)]
pub struct UserStore {
    users: DashMap<String, User>,
}

impl UserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the nickname is taken.
    pub fn add(&self, user: User) -> Result<(), StoreError> {
        match self.users.entry(user.nickname().to_string()) {
            Entry::Occupied(entry) => Err(StoreError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(nickname = %user.nickname(), "User added");
                entry.insert(user);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get(&self, nickname: &str) -> Option<User> {
        self.users.get(nickname).map(|u| u.clone())
    }

    /// Insert or replace a record.
    pub fn update(&self, user: User) {
        self.users.insert(user.nickname().to_string(), user);
    }

    /// Run `f` against a record under its write lock.
    ///
    /// Returns `None` if there is no such nickname.
    pub fn modify<R>(&self, nickname: &str, f: impl FnOnce(&mut User) -> R) -> Option<R> {
        self.users.get_mut(nickname).map(|mut user| f(&mut *user))
    }

    /// Remove a record if present.
    pub fn delete(&self, nickname: &str) {
        if self.users.remove(nickname).is_some() {
            debug!(nickname = %nickname, "User deleted");
        }
    }

    #[must_use]
    pub fn all_users(&self) -> Vec<User> {
        self.users.iter().map(|u| u.clone()).collect()
    }

    #[must_use]
    pub fn all_online_users(&self) -> Vec<User> {
        self.users
            .iter()
            .filter(|u| u.is_online())
            .map(|u| u.clone())
            .collect()
    }

    /// Public views of the online users, in no particular order.
    #[must_use]
    pub fn online_user_infos(&self) -> Vec<UserInfo> {
        self.users
            .iter()
            .filter(|u| u.is_online())
            .map(|u| u.info())
            .collect()
    }

    /// Resolve a credential to an online user.
    ///
    /// Only presence is checked; the credential carries no secret.
    ///
    /// # Errors
    ///
    /// [`AuthFailure::UnknownUser`] if no record exists,
    /// [`AuthFailure::NotLoggedIn`] if the user is offline.
    pub fn check_credentials(&self, credentials: &Credentials) -> Result<User, AuthFailure> {
        let user = self
            .get(&credentials.nickname)
            .ok_or(AuthFailure::UnknownUser)?;
        if !user.is_online() {
            return Err(AuthFailure::NotLoggedIn);
        }
        Ok(user)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
