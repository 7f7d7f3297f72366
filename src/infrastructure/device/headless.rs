use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::ports::{Clock, DeviceError, DeviceEvent, EventOrigin, MediaDevice};
use crate::domain::value_objects::{PlayerState, TrackId};

/// Command received by a [`HeadlessDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    Load(TrackId),
    Play,
    Pause,
    Seek(f64),
}

#[derive(Debug, Default)]
struct PlayerInner {
    track: Option<TrackId>,
    state: PlayerState,
    /// Playhead at `anchor_ms`
    position: f64,
    anchor_ms: i64,
    commands: Vec<DeviceCommand>,
    fail_next: Option<DeviceError>,
}

impl PlayerInner {
    fn position_at(&self, now_ms: i64) -> f64 {
        if self.state == PlayerState::Playing {
            self.position + (now_ms - self.anchor_ms).max(0) as f64 / 1000.0
        } else {
            self.position
        }
    }

    fn rebase(&mut self, now_ms: i64) {
        self.position = self.position_at(now_ms);
        self.anchor_ms = now_ms;
    }
}

/// Player without output that tracks its playhead against a clock.
///
/// Every API command is recorded and announced as a programmatic state
/// change; the `user_*` methods simulate direct interaction.
pub struct HeadlessDevice {
    clock: Arc<dyn Clock>,
    ready: AtomicBool,
    inner: Mutex<PlayerInner>,
    events_tx: Sender<DeviceEvent>,
    _events_rx: InactiveReceiver<DeviceEvent>,
}

impl HeadlessDevice {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (mut events_tx, events_rx) = broadcast(64);
        events_tx.set_overflow(true);
        events_tx.set_await_active(false);

        Self {
            clock,
            ready: AtomicBool::new(false),
            inner: Mutex::new(PlayerInner::default()),
            events_tx,
            _events_rx: events_rx.deactivate(),
        }
    }

    /// Device that accepts commands immediately
    pub fn ready(clock: Arc<dyn Clock>) -> Self {
        let device = Self::new(clock);
        device.ready.store(true, Ordering::SeqCst);
        device
    }

    /// Signal readiness to subscribers
    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            self.emit(DeviceEvent::Ready);
        }
    }

    /// Make the next command fail with `error`
    pub async fn fail_next_command(&self, error: DeviceError) {
        self.inner.lock().await.fail_next = Some(error);
    }

    pub async fn commands(&self) -> Vec<DeviceCommand> {
        self.inner.lock().await.commands.clone()
    }

    pub async fn clear_commands(&self) {
        self.inner.lock().await.commands.clear();
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn loaded_track(&self) -> Option<TrackId> {
        self.inner.lock().await.track.clone()
    }

    pub async fn user_play(&self) {
        self.set_state(PlayerState::Playing, EventOrigin::User).await;
    }

    pub async fn user_pause(&self) {
        self.set_state(PlayerState::Paused, EventOrigin::User).await;
    }

    pub async fn user_seek(&self, position: f64) {
        let now = self.clock.now_millis();
        {
            let mut inner = self.inner.lock().await;
            inner.position = position.max(0.0);
            inner.anchor_ms = now;
        }
        self.emit(DeviceEvent::Seeked {
            position,
            origin: EventOrigin::User,
        });
    }

    async fn set_state(&self, state: PlayerState, origin: EventOrigin) {
        let now = self.clock.now_millis();
        {
            let mut inner = self.inner.lock().await;
            inner.rebase(now);
            inner.state = state;
        }
        self.emit(DeviceEvent::StateChanged { state, origin });
    }

    /// Record a command, honoring readiness and injected failures
    async fn accept(&self, command: DeviceCommand) -> Result<(), DeviceError> {
        if !self.is_ready() {
            return Err(DeviceError::NotReady);
        }
        let mut inner = self.inner.lock().await;
        if let Some(error) = inner.fail_next.take() {
            return Err(error);
        }
        inner.commands.push(command);
        Ok(())
    }

    fn emit(&self, event: DeviceEvent) {
        if let Err(e) = self.events_tx.try_broadcast(event) {
            tracing::trace!("Device event dropped: {:?}", e);
        }
    }
}

#[async_trait]
impl MediaDevice for HeadlessDevice {
    async fn load(&self, track: &TrackId) -> Result<(), DeviceError> {
        self.accept(DeviceCommand::Load(track.clone())).await?;
        let now = self.clock.now_millis();
        {
            let mut inner = self.inner.lock().await;
            inner.track = Some(track.clone());
            inner.position = 0.0;
            inner.anchor_ms = now;
            inner.state = PlayerState::Cued;
        }
        self.emit(DeviceEvent::StateChanged {
            state: PlayerState::Cued,
            origin: EventOrigin::Programmatic,
        });
        Ok(())
    }

    async fn play(&self) -> Result<(), DeviceError> {
        self.accept(DeviceCommand::Play).await?;
        self.set_state(PlayerState::Playing, EventOrigin::Programmatic)
            .await;
        Ok(())
    }

    async fn pause(&self) -> Result<(), DeviceError> {
        self.accept(DeviceCommand::Pause).await?;
        self.set_state(PlayerState::Paused, EventOrigin::Programmatic)
            .await;
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<(), DeviceError> {
        self.accept(DeviceCommand::Seek(seconds)).await?;
        let now = self.clock.now_millis();
        {
            let mut inner = self.inner.lock().await;
            inner.position = seconds.max(0.0);
            inner.anchor_ms = now;
        }
        self.emit(DeviceEvent::Seeked {
            position: seconds,
            origin: EventOrigin::Programmatic,
        });
        Ok(())
    }

    async fn position(&self) -> Result<f64, DeviceError> {
        if !self.is_ready() {
            return Err(DeviceError::NotReady);
        }
        let now = self.clock.now_millis();
        Ok(self.inner.lock().await.position_at(now))
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn events(&self) -> Receiver<DeviceEvent> {
        self.events_tx.new_receiver()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::services::ManualClock;

    #[tokio::test]
    async fn test_position_advances_only_while_playing() {
        let clock = Arc::new(ManualClock::new(0));
        let device = HeadlessDevice::ready(clock.clone());
        device.load(&TrackId::parse("ref:a").unwrap()).await.unwrap();
        device.play().await.unwrap();

        clock.advance(2_500);
        assert_eq!(device.position().await.unwrap(), 2.5);

        device.pause().await.unwrap();
        clock.advance(1_000);
        assert_eq!(device.position().await.unwrap(), 2.5);
    }

    #[tokio::test]
    async fn test_commands_rejected_until_ready() {
        let device = HeadlessDevice::new(Arc::new(ManualClock::new(0)));
        let mut events = device.events();

        assert_eq!(device.play().await, Err(DeviceError::NotReady));
        device.mark_ready();
        assert_eq!(events.recv().await.unwrap(), DeviceEvent::Ready);
        assert!(device.play().await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let device = HeadlessDevice::ready(Arc::new(ManualClock::new(0)));
        device
            .fail_next_command(DeviceError::CommandFailed("boom".into()))
            .await;

        assert!(device.seek(3.0).await.is_err());
        assert!(device.seek(3.0).await.is_ok());
        assert_eq!(device.commands().await, vec![DeviceCommand::Seek(3.0)]);
    }
}
