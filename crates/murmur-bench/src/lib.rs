//! Shared fixtures for the murmur benchmarks.

use murmur_core::{Mailbox, MailboxReader, MessageRouter, User, UserStore};
use std::sync::Arc;

/// A router with `listeners` online users, each registered as listening,
/// plus the reading end of every mailbox.
pub struct Fixture {
    pub router: MessageRouter,
    pub readers: Vec<MailboxReader>,
}

impl Fixture {
    /// Users are named `user-0`, `user-1`, and so on.
    #[must_use]
    pub fn listening(listeners: usize, mailbox_capacity: usize) -> Self {
        let router = MessageRouter::new(Arc::new(UserStore::new()));
        let mut readers = Vec::with_capacity(listeners);

        for i in 0..listeners {
            let nickname = format!("user-{i}");
            let mailbox = Mailbox::with_capacity(mailbox_capacity);
            let mut user = User::new(&nickname, mailbox.clone());
            user.go_online();

            if router.store().add(user).is_ok() {
                router.registry().register(&nickname, mailbox.clone());
            }
            if let Some(reader) = mailbox.try_open() {
                readers.push(reader);
            }
        }

        Self { router, readers }
    }

    /// Empty every mailbox, returning how many frames were taken.
    pub fn drain(&mut self) -> usize {
        let mut taken = 0;
        for reader in &mut self.readers {
            while reader.try_recv().is_some() {
                taken += 1;
            }
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_protocol::Frame;

    #[test]
    fn test_fixture_fans_out_to_everyone() {
        let mut fixture = Fixture::listening(3, 4);
        assert_eq!(fixture.router.registry().len(), 3);

        let fan_out = fixture
            .router
            .deliver_to_all(Arc::new(Frame::public("user-0", "hi", 0)));
        assert_eq!(fan_out.delivered, 3);
        assert_eq!(fixture.drain(), 3);
    }
}
