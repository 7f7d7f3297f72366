use serde::{Deserialize, Serialize};

use crate::domain::entities::Member;

/// Authenticated local user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
        }
    }

    /// Roster entry for this identity
    pub fn as_member(&self) -> Member {
        Member {
            uid: self.uid.clone(),
            display_name: self.display_name.clone(),
        }
    }
}
