use std::sync::Arc;

use crate::domain::entities::Party;
use crate::domain::ports::{Clock, DeviceEvent, EventOrigin};
use crate::domain::repositories::{PartyStore, StoreError};
use crate::domain::value_objects::{Identity, InvalidReference, PartyUpdate, PlayerState, TrackId};

/// Role check applied at every host-only operation
pub struct HostGuard;

impl HostGuard {
    pub fn check(party: &Party, identity: &Identity) -> Result<(), HostControlError> {
        if party.is_host(&identity.uid) {
            Ok(())
        } else {
            Err(HostControlError::PermissionDenied)
        }
    }
}

/// User intent on the host's player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostIntent {
    Played,
    Paused,
    TrackChanged(TrackId),
    Seeked,
}

impl HostIntent {
    /// Map a device event to an intent. Programmatic changes are not intents.
    pub fn from_device_event(event: &DeviceEvent) -> Option<Self> {
        match event {
            DeviceEvent::StateChanged {
                state,
                origin: EventOrigin::User,
            } => match state {
                PlayerState::Playing => Some(HostIntent::Played),
                PlayerState::Paused => Some(HostIntent::Paused),
                _ => None,
            },
            DeviceEvent::Seeked {
                origin: EventOrigin::User,
                ..
            } => Some(HostIntent::Seeked),
            _ => None,
        }
    }
}

/// Translates host intents into authoritative playback commits
pub struct HostController<S: PartyStore + ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    identity: Identity,
    /// Latest document seen by this client
    party: Party,
}

impl<S: PartyStore + ?Sized> HostController<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, identity: Identity, party: Party) -> Self {
        Self {
            store,
            clock,
            identity,
            party,
        }
    }

    /// Track the latest committed document
    pub fn observe(&mut self, party: &Party) {
        if party.id == self.party.id && party.revision >= self.party.revision {
            self.party = party.clone();
        }
    }

    /// Commit one playback update for a user intent
    pub async fn on_local_player_event(
        &mut self,
        intent: HostIntent,
    ) -> Result<Party, HostControlError> {
        HostGuard::check(&self.party, &self.identity)?;

        let (state, track) = match intent {
            HostIntent::Played => (PlayerState::Playing, None),
            HostIntent::Paused => (PlayerState::Paused, None),
            HostIntent::TrackChanged(track) => (PlayerState::Playing, Some(track)),
            HostIntent::Seeked => (self.party.player_state, None),
        };

        if track.is_none() && self.party.current_track_id.is_none() {
            return Err(HostControlError::NoTrack);
        }

        let update = PartyUpdate::playback(state, track, self.clock.now_millis());
        let party = self.store.update(&self.party.id, update).await?;

        tracing::debug!(
            party_id = %party.id,
            state = party.player_state.as_str(),
            revision = party.revision,
            "Host playback committed"
        );
        self.observe(&party);
        Ok(party)
    }

    /// Commit user-initiated device changes; returns `None` for ignored events
    pub async fn on_device_event(
        &mut self,
        event: &DeviceEvent,
    ) -> Result<Option<Party>, HostControlError> {
        match HostIntent::from_device_event(event) {
            Some(intent) => self.on_local_player_event(intent).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn change_track(&mut self, reference: &str) -> Result<Party, HostControlError> {
        HostGuard::check(&self.party, &self.identity)?;
        let track = TrackId::parse(reference)?;
        self.on_local_player_event(HostIntent::TrackChanged(track))
            .await
    }

    pub async fn play(&mut self) -> Result<Party, HostControlError> {
        self.on_local_player_event(HostIntent::Played).await
    }

    pub async fn pause(&mut self) -> Result<Party, HostControlError> {
        self.on_local_player_event(HostIntent::Paused).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostControlError {
    #[error("Only the host can control playback")]
    PermissionDenied,
    #[error(transparent)]
    InvalidReference(#[from] InvalidReference),
    #[error("No track selected")]
    NoTrack,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
