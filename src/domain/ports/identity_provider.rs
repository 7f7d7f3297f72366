use crate::domain::value_objects::Identity;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Not authenticated")]
    Unauthenticated,
}

/// Source of the local user's identity
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Result<Identity, IdentityError>;
}
