use std::sync::Arc;

use crate::domain::entities::Message;
use crate::domain::ports::Clock;
use crate::domain::repositories::{PartyStore, StoreError};
use crate::domain::value_objects::{Identity, PartyUpdate};

/// Send message use case
pub struct SendMessage<S: PartyStore + ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: PartyStore + ?Sized> SendMessage<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append one message; display order is store commit order
    pub async fn execute(
        &self,
        party_id: &str,
        sender: &Identity,
        text: &str,
    ) -> Result<Message, SendMessageError> {
        if text.trim().is_empty() {
            return Err(SendMessageError::EmptyMessage);
        }

        let message = Message::new(sender, text, self.clock.now_millis());
        self.store
            .update(party_id, PartyUpdate::add_message(message.clone()))
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => SendMessageError::PartyNotFound,
                other => SendMessageError::Store(other),
            })?;

        tracing::debug!(party_id = %party_id, sender_id = %sender.uid, "Message sent");
        Ok(message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendMessageError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Party not found")]
    PartyNotFound,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Party;
    use crate::infrastructure::services::ManualClock;
    use crate::infrastructure::store::MemoryPartyStore;

    async fn setup() -> SendMessage<MemoryPartyStore> {
        let store = Arc::new(MemoryPartyStore::default());
        store
            .create(Party::new("p1".into(), &Identity::new("alice", "Alice"), 0))
            .await
            .unwrap();
        SendMessage::new(store, Arc::new(ManualClock::new(42)))
    }

    #[tokio::test]
    async fn test_whitespace_is_rejected() {
        let chat = setup().await;
        let result = chat
            .execute("p1", &Identity::new("alice", "Alice"), "  \n\t")
            .await;
        assert!(matches!(result, Err(SendMessageError::EmptyMessage)));
    }

    #[tokio::test]
    async fn test_message_is_stamped_and_attributed() {
        let chat = setup().await;
        let message = chat
            .execute("p1", &Identity::new("bob", "Bob"), "hi")
            .await
            .unwrap();

        assert_eq!(message.sender_id, "bob");
        assert_eq!(message.sender_name, "Bob");
        assert_eq!(message.timestamp, 42);
    }

    #[tokio::test]
    async fn test_missing_party() {
        let chat = setup().await;
        let result = chat
            .execute("nope", &Identity::new("bob", "Bob"), "hi")
            .await;
        assert!(matches!(result, Err(SendMessageError::PartyNotFound)));
    }
}
