use serde::{Deserialize, Serialize};

/// Party roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub uid: String,
    pub display_name: String,
}
