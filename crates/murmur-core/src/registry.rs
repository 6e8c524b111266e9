//! Nickname to mailbox map for clients that are currently listening.

use crate::mailbox::Mailbox;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// The set of live delivery handles.
///
/// An entry exists exactly while a delivery loop runs for that nickname.
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct ConnectedRegistry {
    clients: Arc<DashMap<String, Mailbox>>,
}

impl ConnectedRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle for `nickname`.
    ///
    /// Returns `false` and leaves the map untouched if one is already present.
    pub fn register(&self, nickname: &str, mailbox: Mailbox) -> bool {
        match self.clients.entry(nickname.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(mailbox);
                debug!(nickname = %nickname, "Client registered");
                true
            }
        }
    }

    /// Remove the handle for `nickname`, returning it if present.
    pub fn deregister(&self, nickname: &str) -> Option<Mailbox> {
        let removed = self.clients.remove(nickname).map(|(_, mailbox)| mailbox);
        if removed.is_some() {
            debug!(nickname = %nickname, "Client deregistered");
        }
        removed
    }

    #[must_use]
    pub fn get(&self, nickname: &str) -> Option<Mailbox> {
        self.clients.get(nickname).map(|m| m.clone())
    }

    #[must_use]
    pub fn contains(&self, nickname: &str) -> bool {
        self.clients.contains_key(nickname)
    }

    /// Copy of every live handle, taken so fan-out holds no map locks.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Mailbox> {
        self.clients.iter().map(|m| m.value().clone()).collect()
    }

    /// Nicknames currently listening.
    #[must_use]
    pub fn nicknames(&self) -> Vec<String> {
        self.clients.iter().map(|m| m.key().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_deregister() {
        let registry = ConnectedRegistry::new();
        let mailbox = Mailbox::with_capacity(4);

        assert!(registry.register("alice", mailbox.clone()));
        assert!(registry.contains("alice"));
        assert!(registry.get("alice").unwrap().same_queue(&mailbox));

        // Second registration is refused and keeps the first handle
        assert!(!registry.register("alice", Mailbox::with_capacity(4)));
        assert!(registry.get("alice").unwrap().same_queue(&mailbox));

        assert!(registry.deregister("alice").is_some());
        assert!(registry.deregister("alice").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_and_shared_clone() {
        let registry = ConnectedRegistry::new();
        let shared = registry.clone();

        registry.register("alice", Mailbox::with_capacity(4));
        shared.register("bob", Mailbox::with_capacity(4));

        assert_eq!(registry.snapshot().len(), 2);
        let mut names = shared.nicknames();
        names.sort();
        assert_eq!(names, ["alice", "bob"]);
    }
}
