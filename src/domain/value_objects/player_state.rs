use serde::{Deserialize, Serialize};

/// Embedded player state as shared through the party document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Cued,
    Ended,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Unstarted => "unstarted",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Buffering => "buffering",
            PlayerState::Cued => "cued",
            PlayerState::Ended => "ended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unstarted" => Some(PlayerState::Unstarted),
            "playing" => Some(PlayerState::Playing),
            "paused" => Some(PlayerState::Paused),
            "buffering" => Some(PlayerState::Buffering),
            "cued" => Some(PlayerState::Cued),
            "ended" => Some(PlayerState::Ended),
            _ => None,
        }
    }

    /// Numeric code used by embedded web players
    pub fn code(&self) -> i8 {
        match self {
            PlayerState::Unstarted => -1,
            PlayerState::Ended => 0,
            PlayerState::Playing => 1,
            PlayerState::Paused => 2,
            PlayerState::Buffering => 3,
            PlayerState::Cued => 5,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(PlayerState::Unstarted),
            0 => Some(PlayerState::Ended),
            1 => Some(PlayerState::Playing),
            2 => Some(PlayerState::Paused),
            3 => Some(PlayerState::Buffering),
            5 => Some(PlayerState::Cued),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_embedded_player() {
        assert_eq!(PlayerState::from_code(1), Some(PlayerState::Playing));
        assert_eq!(PlayerState::from_code(2), Some(PlayerState::Paused));
        assert_eq!(PlayerState::from_code(4), None);
        assert_eq!(PlayerState::Cued.code(), 5);
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&PlayerState::Buffering).unwrap();
        assert_eq!(json, "\"buffering\"");
        assert_eq!(PlayerState::from_str("ended"), Some(PlayerState::Ended));
    }
}
