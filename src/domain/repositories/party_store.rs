use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::entities::Party;
use crate::domain::value_objects::PartyUpdate;

/// Error type for party store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether the caller should retry with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Full party documents in commit order; dropping it cancels the subscription
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<Party, StoreError>> + Send>>;

/// Shared party document store
#[async_trait]
pub trait PartyStore: Send + Sync {
    /// Persist a new party and return its id
    async fn create(&self, initial: Party) -> Result<String, StoreError>;

    /// Fetch the current document
    async fn get(&self, party_id: &str) -> Result<Party, StoreError>;

    /// Subscribe to snapshots. The first item is always the current document.
    async fn subscribe(&self, party_id: &str) -> Result<SnapshotStream, StoreError>;

    /// Merge a partial update and return the committed document
    async fn update(&self, party_id: &str, update: PartyUpdate) -> Result<Party, StoreError>;
}
