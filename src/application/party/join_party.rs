use std::sync::Arc;

use crate::domain::entities::Party;
use crate::domain::repositories::{PartyStore, StoreError};
use crate::domain::value_objects::{Identity, PartyUpdate};

/// Join party output
pub struct JoinPartyOutput {
    pub party: Party,
    /// `true` when the identity was already on the roster
    pub already_member: bool,
}

/// Join party use case
pub struct JoinParty<S: PartyStore + ?Sized> {
    store: Arc<S>,
}

impl<S: PartyStore + ?Sized> JoinParty<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        party_id: &str,
        identity: &Identity,
    ) -> Result<JoinPartyOutput, JoinPartyError> {
        let party = self.store.get(party_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => JoinPartyError::PartyNotFound,
            other => JoinPartyError::Store(other),
        })?;

        if party.has_member(&identity.uid) {
            return Ok(JoinPartyOutput {
                party,
                already_member: true,
            });
        }

        // Union merge makes a racing duplicate join harmless
        let party = self
            .store
            .update(party_id, PartyUpdate::add_member(identity.as_member()))
            .await?;

        tracing::info!(party_id = %party_id, uid = %identity.uid, "Member joined");
        Ok(JoinPartyOutput {
            party,
            already_member: false,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JoinPartyError {
    #[error("Party not found")]
    PartyNotFound,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::MemoryPartyStore;

    #[tokio::test]
    async fn test_join_missing_party() {
        let store = Arc::new(MemoryPartyStore::default());
        let result = JoinParty::new(store)
            .execute("missing", &Identity::new("bob", "Bob"))
            .await;
        assert!(matches!(result, Err(JoinPartyError::PartyNotFound)));
    }

    #[tokio::test]
    async fn test_rejoin_is_idempotent() {
        let store = Arc::new(MemoryPartyStore::default());
        let alice = Identity::new("alice", "Alice");
        store.create(Party::new("p1".into(), &alice, 0)).await.unwrap();

        let join = JoinParty::new(store.clone());
        let bob = Identity::new("bob", "Bob");
        assert!(!join.execute("p1", &bob).await.unwrap().already_member);
        let again = join.execute("p1", &bob).await.unwrap();

        assert!(again.already_member);
        assert_eq!(again.party.members.len(), 2);
    }
}
