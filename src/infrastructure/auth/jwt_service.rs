use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Identity;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub display_name: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id.clone(), self.display_name.clone())
    }
}

/// JWT service for token management
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in_seconds: usize,
}

impl JwtService {
    pub fn new(secret: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in_seconds: 7 * 24 * 60 * 60, // 7 days
        }
    }

    /// Sign a token for `identity`
    pub fn sign(&self, identity: &Identity) -> Result<String, JwtError> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            user_id: identity.uid.clone(),
            display_name: identity.display_name.clone(),
            exp: now + self.expires_in_seconds,
            iat: now,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Sign(e.to_string()))
    }

    /// Verify and decode a JWT token
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let validation = Validation::default();
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::Invalid,
                _ => JwtError::Verify(e.to_string()),
            })
    }
}

/// Read claims without the signing secret.
///
/// Clients use this to learn their own identity; the server still verifies.
pub fn decode_unverified(token: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::Verify(e.to_string()))
}

/// JWT error types
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to sign token: {0}")]
    Sign(String),
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Failed to verify token: {0}")]
    Verify(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let service = JwtService::new("secret".into());
        let token = service.sign(&Identity::new("alice", "Alice")).unwrap();

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.identity(), Identity::new("alice", "Alice"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtService::new("one".into())
            .sign(&Identity::new("alice", "Alice"))
            .unwrap();
        assert!(JwtService::new("two".into()).verify(&token).is_err());
    }

    #[test]
    fn test_decode_unverified_reads_identity() {
        let token = JwtService::new("secret".into())
            .sign(&Identity::new("bob", "Bob"))
            .unwrap();
        assert_eq!(decode_unverified(&token).unwrap().user_id, "bob");
    }
}
