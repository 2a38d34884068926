//! An in-process mailbox `Messenger`.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::{Message, Messenger};
use crate::errors::ArtemisError;

/// A mailbox-style messenger: broadcasts and directed sends land in an
/// in-memory mailbox per recipient, with at-least-once delivery
/// deduplicated by `message_id` on the producer side as a courtesy (real
/// consumers must still dedupe independently, per the interface
/// contract).
#[derive(Default)]
pub struct MailboxMessenger {
    mailboxes: DashMap<String, Vec<Message>>,
    shared_state: DashMap<String, HashMap<String, serde_json::Value>>,
    seen_ids: Mutex<HashSet<String>>,
}

impl MailboxMessenger {
    /// Creates an empty messenger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns every message queued for `recipient`.
    #[must_use]
    pub fn drain(&self, recipient: &str) -> Vec<Message> {
        self.mailboxes.get_mut(recipient).map(|mut m| std::mem::take(&mut *m)).unwrap_or_default()
    }
}

#[async_trait]
impl Messenger for MailboxMessenger {
    async fn send(&self, message: Message) -> Result<(), ArtemisError> {
        {
            let mut seen = self.seen_ids.lock();
            if !seen.insert(message.message_id.clone()) {
                return Ok(());
            }
        }

        self.mailboxes
            .entry(message.to.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn get_shared_state(&self, card_id: &str) -> Result<HashMap<String, serde_json::Value>, ArtemisError> {
        Ok(self.shared_state.get(card_id).map(|s| s.clone()).unwrap_or_default())
    }

    async fn update_shared_state(
        &self,
        card_id: &str,
        patch: HashMap<String, serde_json::Value>,
    ) -> Result<(), ArtemisError> {
        let mut entry = self.shared_state.entry(card_id.to_string()).or_default();
        for (key, value) in patch {
            entry.insert(key, value);
        }
        Ok(())
    }
}
