use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Identity;

/// Chat message in the party log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique per send, so a retried append is not duplicated
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    /// Sender's local clock in milliseconds; not used for ordering
    pub timestamp: i64,
}

impl Message {
    pub fn new(sender: &Identity, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id: sender.uid.clone(),
            sender_name: sender.display_name.clone(),
            text: text.into(),
            timestamp,
        }
    }
}
