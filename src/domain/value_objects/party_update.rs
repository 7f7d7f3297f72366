use serde::{Deserialize, Serialize};

use crate::domain::entities::{Member, Message};
use crate::domain::value_objects::{PlayerState, TrackId};

/// Host-owned playback fields, overwritten as a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackUpdate {
    pub player_state: PlayerState,
    /// `None` keeps the current track
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_track_id: Option<TrackId>,
    pub playback_timestamp: i64,
}

/// Partial party document submitted to the store.
///
/// Playback is last-committed-wins; `add_members` and `add_messages` are
/// unioned into the existing arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback: Option<PlaybackUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_messages: Vec<Message>,
}

impl PartyUpdate {
    pub fn playback(
        player_state: PlayerState,
        current_track_id: Option<TrackId>,
        playback_timestamp: i64,
    ) -> Self {
        Self {
            playback: Some(PlaybackUpdate {
                player_state,
                current_track_id,
                playback_timestamp,
            }),
            ..Self::default()
        }
    }

    pub fn add_member(member: Member) -> Self {
        Self {
            add_members: vec![member],
            ..Self::default()
        }
    }

    pub fn add_message(message: Message) -> Self {
        Self {
            add_messages: vec![message],
            ..Self::default()
        }
    }

    pub fn touches_playback(&self) -> bool {
        self.playback.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.playback.is_none() && self.add_members.is_empty() && self.add_messages.is_empty()
    }
}
