use serde::{Deserialize, Serialize};

use crate::domain::entities::{Member, Message};
use crate::domain::value_objects::{Identity, PartyUpdate, PlayerState, TrackId};

/// Shared party document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: String,
    pub host_id: String,
    pub members: Vec<Member>,
    pub current_track_id: Option<TrackId>,
    pub player_state: PlayerState,
    /// Commit instant of the last playback change, in milliseconds
    pub playback_timestamp: i64,
    pub messages: Vec<Message>,
    /// Incremented by the store on every committed change
    #[serde(default)]
    pub revision: u64,
    pub created_at: i64,
}

impl Party {
    /// Create a new party hosted by `host`
    pub fn new(id: String, host: &Identity, now: i64) -> Self {
        Self {
            id,
            host_id: host.uid.clone(),
            members: vec![host.as_member()],
            current_track_id: None,
            player_state: PlayerState::Unstarted,
            playback_timestamp: now,
            messages: Vec::new(),
            revision: 0,
            created_at: now,
        }
    }

    pub fn is_host(&self, uid: &str) -> bool {
        self.host_id == uid
    }

    pub fn has_member(&self, uid: &str) -> bool {
        self.members.iter().any(|m| m.uid == uid)
    }

    /// Merge an update into the document.
    ///
    /// Returns `false` when nothing changed, in which case no commit is needed.
    pub fn apply(&mut self, update: &PartyUpdate) -> bool {
        let mut changed = false;

        if let Some(playback) = &update.playback {
            self.player_state = playback.player_state;
            if let Some(track) = &playback.current_track_id {
                self.current_track_id = Some(track.clone());
            }
            self.playback_timestamp = playback.playback_timestamp;
            changed = true;
        }

        changed |= self.merge_members(&update.add_members) > 0;
        changed |= self.merge_messages(&update.add_messages) > 0;
        changed
    }

    /// Union by uid; returns the number of new members
    pub fn merge_members(&mut self, incoming: &[Member]) -> usize {
        let mut added = 0;
        for member in incoming {
            if !self.has_member(&member.uid) {
                self.members.push(member.clone());
                added += 1;
            }
        }
        added
    }

    /// Union by message id; returns the number of new messages
    pub fn merge_messages(&mut self, incoming: &[Message]) -> usize {
        let mut added = 0;
        for message in incoming {
            if !self.messages.iter().any(|m| m.id == message.id) {
                self.messages.push(message.clone());
                added += 1;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn host() -> Identity {
        Identity::new("alice", "Alice")
    }

    fn uids(party: &Party) -> BTreeSet<String> {
        party.members.iter().map(|m| m.uid.clone()).collect()
    }

    #[test]
    fn test_new_party() {
        let party = Party::new("p1".into(), &host(), 1_000);
        assert_eq!(party.host_id, "alice");
        assert_eq!(party.members.len(), 1);
        assert!(party.is_host("alice"));
        assert!(party.current_track_id.is_none());
        assert_eq!(party.player_state, PlayerState::Unstarted);
    }

    #[test]
    fn test_rejoin_is_noop() {
        let mut party = Party::new("p1".into(), &host(), 0);
        let bob = Identity::new("bob", "Bob").as_member();

        assert!(party.apply(&PartyUpdate::add_member(bob.clone())));
        assert!(!party.apply(&PartyUpdate::add_member(bob)));
        assert_eq!(party.members.len(), 2);
    }

    #[test]
    fn test_member_union_is_order_independent() {
        let joins: Vec<PartyUpdate> = ["bob", "carol", "dave"]
            .iter()
            .map(|uid| PartyUpdate::add_member(Identity::new(*uid, *uid).as_member()))
            .collect();

        let orders = [[0, 1, 2], [2, 1, 0], [1, 2, 0], [1, 0, 2]];
        let mut results = Vec::new();
        for order in orders {
            let mut party = Party::new("p1".into(), &host(), 0);
            for i in order {
                party.apply(&joins[i]);
            }
            // Redelivery must not duplicate
            party.apply(&joins[order[0]]);
            assert_eq!(party.members.len(), 4);
            results.push(uids(&party));
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_messages_from_two_senders_both_survive() {
        let mut party = Party::new("p1".into(), &host(), 0);
        let a = Message::new(&host(), "hi", 5);
        let b = Message::new(&Identity::new("bob", "Bob"), "hi", 5);

        party.apply(&PartyUpdate::add_message(a.clone()));
        party.apply(&PartyUpdate::add_message(b.clone()));
        party.apply(&PartyUpdate::add_message(a));

        assert_eq!(party.messages.len(), 2);
        assert_eq!(party.messages[1].id, b.id);
    }

    #[test]
    fn test_playback_overwrite_keeps_track() {
        let mut party = Party::new("p1".into(), &host(), 0);
        let track = TrackId::parse("ref:VID123").unwrap();

        party.apply(&PartyUpdate::playback(PlayerState::Playing, Some(track.clone()), 10));
        party.apply(&PartyUpdate::playback(PlayerState::Paused, None, 20));

        assert_eq!(party.current_track_id, Some(track));
        assert_eq!(party.player_state, PlayerState::Paused);
        assert_eq!(party.playback_timestamp, 20);
    }
}
