use async_broadcast::Receiver;
use async_trait::async_trait;

use crate::domain::value_objects::{PlayerState, TrackId};

/// Error reported by the local player device
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Player is not ready")]
    NotReady,
    #[error("Failed to load track {0}")]
    LoadFailed(String),
    #[error("Player command failed: {0}")]
    CommandFailed(String),
}

/// Who caused a device state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// The user interacted with the player directly
    User,
    /// Result of a command issued through [`MediaDevice`]
    Programmatic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Device can accept commands
    Ready,
    StateChanged {
        state: PlayerState,
        origin: EventOrigin,
    },
    Seeked {
        position: f64,
        origin: EventOrigin,
    },
}

/// Capability interface over an external media player
#[async_trait]
pub trait MediaDevice: Send + Sync {
    async fn load(&self, track: &TrackId) -> Result<(), DeviceError>;

    async fn play(&self) -> Result<(), DeviceError>;

    async fn pause(&self) -> Result<(), DeviceError>;

    async fn seek(&self, seconds: f64) -> Result<(), DeviceError>;

    /// Current playhead in seconds
    async fn position(&self) -> Result<f64, DeviceError>;

    fn is_ready(&self) -> bool;

    /// Subscribe to device events
    fn events(&self) -> Receiver<DeviceEvent>;
}
