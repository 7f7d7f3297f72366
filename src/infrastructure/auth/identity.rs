use crate::domain::ports::{IdentityError, IdentityProvider};
use crate::domain::value_objects::Identity;
use crate::infrastructure::auth::decode_unverified;

/// Identity fixed at construction; `None` means signed out
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    identity: Option<Identity>,
}

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn signed_out() -> Self {
        Self { identity: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Result<Identity, IdentityError> {
        self.identity.clone().ok_or(IdentityError::Unauthenticated)
    }
}

/// Identity carried by a bearer token issued by the server
#[derive(Debug, Clone)]
pub struct BearerIdentity {
    identity: Identity,
}

impl BearerIdentity {
    pub fn from_token(token: impl Into<String>) -> Result<Self, IdentityError> {
        let token = token.into();
        let claims = decode_unverified(&token).map_err(|e| {
            tracing::warn!("Unreadable bearer token: {}", e);
            IdentityError::Unauthenticated
        })?;

        Ok(Self {
            identity: claims.identity(),
        })
    }
}

impl IdentityProvider for BearerIdentity {
    fn current_identity(&self) -> Result<Identity, IdentityError> {
        Ok(self.identity.clone())
    }
}
