use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::entities::Party;
use crate::domain::repositories::{PartyStore, SnapshotStream, StoreError};
use crate::domain::value_objects::PartyUpdate;
use crate::infrastructure::store::SnapshotHub;

/// In-process party store
pub struct MemoryPartyStore {
    parties: RwLock<HashMap<String, Party>>,
    hub: SnapshotHub,
}

impl MemoryPartyStore {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            parties: RwLock::new(HashMap::new()),
            hub: SnapshotHub::new(channel_capacity),
        }
    }

    /// Number of stored parties
    pub async fn count(&self) -> usize {
        self.parties.read().await.len()
    }
}

impl Default for MemoryPartyStore {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl PartyStore for MemoryPartyStore {
    async fn create(&self, mut initial: Party) -> Result<String, StoreError> {
        let mut parties = self.parties.write().await;
        if parties.contains_key(&initial.id) {
            return Err(StoreError::AlreadyExists(initial.id));
        }

        initial.revision = 1;
        let id = initial.id.clone();
        parties.insert(id.clone(), initial);
        tracing::info!(party_id = %id, "Party created");
        Ok(id)
    }

    async fn get(&self, party_id: &str) -> Result<Party, StoreError> {
        self.parties
            .read()
            .await
            .get(party_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(party_id.to_string()))
    }

    async fn subscribe(&self, party_id: &str) -> Result<SnapshotStream, StoreError> {
        // Receiver first so no commit falls between the read and the subscription
        let receiver = self.hub.receiver(party_id).await;
        let current = self.get(party_id).await?;
        Ok(SnapshotHub::stream(current, receiver))
    }

    async fn update(&self, party_id: &str, update: PartyUpdate) -> Result<Party, StoreError> {
        let mut parties = self.parties.write().await;
        let party = parties
            .get_mut(party_id)
            .ok_or_else(|| StoreError::NotFound(party_id.to_string()))?;

        if party.apply(&update) {
            party.revision += 1;
            // Published under the write lock to keep commit order
            self.hub.publish(party).await;
        }
        Ok(party.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;

    use super::*;
    use crate::domain::entities::Message;
    use crate::domain::value_objects::{Identity, PlayerState};

    fn alice() -> Identity {
        Identity::new("alice", "Alice")
    }

    async fn store_with_party() -> MemoryPartyStore {
        let store = MemoryPartyStore::default();
        store
            .create(Party::new("p1".into(), &alice(), 0))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_get_missing_party() {
        let store = MemoryPartyStore::default();
        assert_eq!(
            store.get("nope").await,
            Err(StoreError::NotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let store = store_with_party().await;
        let result = store.create(Party::new("p1".into(), &alice(), 0)).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_update_missing_party() {
        let store = MemoryPartyStore::default();
        let result = store
            .update("nope", PartyUpdate::add_member(alice().as_member()))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_subscribe_yields_full_documents() {
        let store = store_with_party().await;
        let mut stream = store.subscribe("p1").await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.members.len(), 1);

        store
            .update("p1", PartyUpdate::add_member(Identity::new("bob", "Bob").as_member()))
            .await
            .unwrap();
        store
            .update("p1", PartyUpdate::playback(PlayerState::Paused, None, 50))
            .await
            .unwrap();

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.members.len(), 2);
        let third = stream.next().await.unwrap().unwrap();
        assert_eq!(third.members.len(), 2);
        assert_eq!(third.player_state, PlayerState::Paused);
        assert!(third.revision > second.revision);
    }

    #[tokio::test]
    async fn test_noop_update_does_not_commit() {
        let store = store_with_party().await;
        let before = store.get("p1").await.unwrap();
        let after = store
            .update("p1", PartyUpdate::add_member(alice().as_member()))
            .await
            .unwrap();
        assert_eq!(before.revision, after.revision);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(store_with_party().await);
        let mut handles = Vec::new();

        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let who = Identity::new(format!("user{i}"), format!("User {i}"));
                store
                    .update("p1", PartyUpdate::add_member(who.as_member()))
                    .await
                    .unwrap();
                store
                    .update("p1", PartyUpdate::add_message(Message::new(&who, "hey", 0)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let party = store.get("p1").await.unwrap();
        assert_eq!(party.members.len(), 21);
        assert_eq!(party.messages.len(), 20);
    }
}
