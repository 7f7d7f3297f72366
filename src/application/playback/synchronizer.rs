//! Playback synchronizer
//!
//! Runs on every non-host client and reconciles the local player with the
//! host's committed playback fields. The shared document carries no playhead,
//! only the instant of the last host action; the elapsed time since that
//! instant (the drift) is added on top of the local position. Every new host
//! action resets the accumulated error.
//!
//! The synchronizer never writes to the store.

use std::sync::Arc;

use serde::Serialize;

use crate::application::session::SubscriptionLease;
use crate::domain::entities::Party;
use crate::domain::ports::{Clock, DeviceError, MediaDevice};
use crate::domain::value_objects::{PlayerState, TrackId};

/// Lifecycle of the synchronizer for one party view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// Device cannot accept commands yet
    Uninitialized,
    Ready,
    Synced,
    Correcting,
}

/// Status reported to the UI alongside each snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    WaitingForDevice,
    /// No track selected yet
    Idle,
    Correcting,
    #[serde(rename_all = "camelCase")]
    Synced {
        track_id: TrackId,
        player_state: PlayerState,
        drift_ms: i64,
    },
    /// Local player is driven by this client
    Hosting,
    /// Stale or desynced; recovers on the next snapshot
    Degraded { reason: String },
}

/// Playback fields of a snapshot; equal keys need no correction
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlaybackKey {
    track: Option<TrackId>,
    state: PlayerState,
    stamp: i64,
}

impl PlaybackKey {
    fn of(party: &Party) -> Self {
        Self {
            track: party.current_track_id.clone(),
            state: party.player_state,
            stamp: party.playback_timestamp,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CorrectionError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("subscription ended")]
    Cancelled,
}

/// Milliseconds since the host's commit, as seen by this client.
///
/// Negative values come from clock skew and are treated as zero.
pub fn drift_millis(local_now: i64, playback_timestamp: i64) -> i64 {
    local_now.saturating_sub(playback_timestamp).max(0)
}

pub struct PlaybackSynchronizer<D: MediaDevice + ?Sized> {
    device: Arc<D>,
    clock: Arc<dyn Clock>,
    lease: SubscriptionLease,
    phase: SyncPhase,
    /// Latest snapshot received before the device was ready
    pending: Option<Party>,
    loaded_track: Option<TrackId>,
    applied: Option<PlaybackKey>,
    status: SyncStatus,
}

impl<D: MediaDevice + ?Sized> PlaybackSynchronizer<D> {
    pub fn new(device: Arc<D>, clock: Arc<dyn Clock>, lease: SubscriptionLease) -> Self {
        let (phase, status) = if device.is_ready() {
            (SyncPhase::Ready, SyncStatus::Idle)
        } else {
            (SyncPhase::Uninitialized, SyncStatus::WaitingForDevice)
        };

        Self {
            device,
            clock,
            lease,
            phase,
            pending: None,
            loaded_track: None,
            applied: None,
            status,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn loaded_track(&self) -> Option<&TrackId> {
        self.loaded_track.as_ref()
    }

    /// Device signalled readiness; replay the buffered snapshot if any
    pub async fn on_device_ready(&mut self) -> SyncStatus {
        if self.phase != SyncPhase::Uninitialized {
            return self.status.clone();
        }

        self.phase = SyncPhase::Ready;
        self.status = SyncStatus::Idle;
        tracing::debug!("Player ready");

        match self.pending.take() {
            Some(party) => self.on_snapshot(&party).await,
            None => self.status.clone(),
        }
    }

    /// Reconcile the local player with a committed snapshot
    pub async fn on_snapshot(&mut self, party: &Party) -> SyncStatus {
        if !self.lease.is_current() {
            return self.status.clone();
        }

        if self.phase == SyncPhase::Uninitialized {
            // Intermediate snapshots are superseded by later ones
            self.pending = Some(party.clone());
            return self.status.clone();
        }

        let key = PlaybackKey::of(party);
        if self.applied.as_ref() == Some(&key) {
            return self.status.clone();
        }

        match self.reconcile(party).await {
            Ok(status) => {
                self.applied = Some(key);
                self.status = status;
            }
            Err(CorrectionError::Cancelled) => {
                tracing::debug!(party_id = %party.id, "Correction abandoned after leaving view");
            }
            Err(CorrectionError::Device(e)) => {
                // Not recorded as applied, so the next snapshot retries
                tracing::warn!(party_id = %party.id, "Playback correction failed: {}", e);
                self.phase = SyncPhase::Correcting;
                self.status = SyncStatus::Degraded {
                    reason: e.to_string(),
                };
            }
        }
        self.status.clone()
    }

    fn ensure_current(&self) -> Result<(), CorrectionError> {
        if self.lease.is_current() {
            Ok(())
        } else {
            Err(CorrectionError::Cancelled)
        }
    }

    async fn reconcile(&mut self, party: &Party) -> Result<SyncStatus, CorrectionError> {
        let Some(track) = party.current_track_id.as_ref() else {
            self.phase = SyncPhase::Synced;
            return Ok(SyncStatus::Idle);
        };

        let fresh = self.loaded_track.as_ref() != Some(track);
        if fresh {
            self.phase = SyncPhase::Correcting;
            self.status = SyncStatus::Correcting;
            self.ensure_current()?;
            self.device.load(track).await?;
            self.loaded_track = Some(track.clone());
            tracing::info!(party_id = %party.id, track = %track, "Loaded track");
        }

        let drift_ms = drift_millis(self.clock.now_millis(), party.playback_timestamp);

        match party.player_state {
            PlayerState::Playing => {
                let base = if fresh {
                    0.0
                } else {
                    self.ensure_current()?;
                    self.device.position().await?
                };
                let target = base + drift_ms as f64 / 1000.0;

                self.ensure_current()?;
                self.device.seek(target).await?;
                self.ensure_current()?;
                self.device.play().await?;
                tracing::debug!(party_id = %party.id, drift_ms, target, "Resumed with drift correction");
            }
            PlayerState::Paused => {
                self.ensure_current()?;
                self.device.pause().await?;
            }
            // Buffering, cued and ended are reached by each player on its own
            _ => {}
        }

        self.phase = SyncPhase::Synced;
        Ok(SyncStatus::Synced {
            track_id: track.clone(),
            player_state: party.player_state,
            drift_ms,
        })
    }
}
