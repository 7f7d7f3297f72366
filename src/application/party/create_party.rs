use std::sync::Arc;

use uuid::Uuid;

use crate::domain::entities::Party;
use crate::domain::ports::Clock;
use crate::domain::repositories::{PartyStore, StoreError};
use crate::domain::value_objects::Identity;

/// Create party use case
pub struct CreateParty<S: PartyStore + ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: PartyStore + ?Sized> CreateParty<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The caller becomes the host and first member
    pub async fn execute(&self, host: &Identity) -> Result<Party, CreatePartyError> {
        if host.uid.trim().is_empty() {
            return Err(CreatePartyError::Validation("Host uid is required".into()));
        }

        let mut party = Party::new(Uuid::new_v4().to_string(), host, self.clock.now_millis());
        party.id = self.store.create(party.clone()).await?;
        party.revision = 1;

        tracing::info!(party_id = %party.id, host_id = %host.uid, "Party created");
        Ok(party)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CreatePartyError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
