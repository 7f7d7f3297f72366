use crate::application::playback::HostGuard;
use crate::domain::entities::Party;
use crate::domain::value_objects::{Identity, PartyUpdate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteRejected {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid document: {0}")]
    Invalid(String),
}

/// A new party must be hosted by its creator with only the creator on the roster
pub fn authorize_create(initial: &Party, caller: &Identity) -> Result<(), WriteRejected> {
    if initial.host_id != caller.uid {
        return Err(WriteRejected::PermissionDenied(
            "a party can only be created with the caller as host".into(),
        ));
    }
    if initial.id.trim().is_empty() {
        return Err(WriteRejected::Invalid("party id is required".into()));
    }
    if initial.members.len() != 1 || initial.members[0].uid != caller.uid {
        return Err(WriteRejected::Invalid(
            "initial roster must contain only the host".into(),
        ));
    }
    if initial.current_track_id.is_some() || !initial.messages.is_empty() {
        return Err(WriteRejected::Invalid(
            "a new party starts without track or messages".into(),
        ));
    }
    Ok(())
}

/// Enforce the single-writer rules for a merge update from `caller`
pub fn authorize_update(
    party: &Party,
    caller: &Identity,
    update: &PartyUpdate,
) -> Result<(), WriteRejected> {
    if update.is_empty() {
        return Err(WriteRejected::Invalid("update changes nothing".into()));
    }

    if let Some(playback) = &update.playback {
        HostGuard::check(party, caller)
            .map_err(|e| WriteRejected::PermissionDenied(e.to_string()))?;
        if playback.playback_timestamp < 0 {
            return Err(WriteRejected::Invalid(
                "playback timestamp cannot be negative".into(),
            ));
        }
    }

    if update.add_members.iter().any(|m| m.uid != caller.uid) {
        return Err(WriteRejected::PermissionDenied(
            "members can only add themselves".into(),
        ));
    }

    for message in &update.add_messages {
        if message.sender_id != caller.uid {
            return Err(WriteRejected::PermissionDenied(
                "messages must be sent as the caller".into(),
            ));
        }
        if message.text.trim().is_empty() {
            return Err(WriteRejected::Invalid("message cannot be empty".into()));
        }
    }

    Ok(())
}

/// A host clock running ahead of the server cannot stamp the future
pub fn bound_playback_timestamp(update: &mut PartyUpdate, now_millis: i64) {
    if let Some(playback) = update.playback.as_mut() {
        playback.playback_timestamp = playback.playback_timestamp.min(now_millis);
    }
}
