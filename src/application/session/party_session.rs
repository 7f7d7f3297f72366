//! Client-side facade over one party view
//!
//! A session owns at most one open view. Opening a view spawns a task that
//! follows the party's snapshot feed: the host's task commits user actions
//! seen on the local device, every other client's task feeds snapshots to a
//! [`PlaybackSynchronizer`]. Each view runs under a [`SubscriptionLease`], so
//! work left over from a closed view never touches the device or the feed.

use std::sync::Arc;

use async_broadcast::{broadcast, InactiveReceiver, Receiver, RecvError, Sender};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::application::chat::{SendMessage, SendMessageError};
use crate::application::party::{CreateParty, CreatePartyError, JoinParty, JoinPartyError};
use crate::application::playback::{
    HostControlError, HostController, PlaybackSynchronizer, SyncStatus,
};
use crate::application::session::{Backoff, SubscriptionLease, ViewGeneration};
use crate::domain::entities::{Message, Party};
use crate::domain::ports::{
    Clock, DeviceError, DeviceEvent, IdentityError, IdentityProvider, MediaDevice,
};
use crate::domain::repositories::{PartyStore, SnapshotStream, StoreError};
use crate::domain::value_objects::Identity;

const UPDATE_CHANNEL_CAPACITY: usize = 32;

/// Role of the local identity in the open party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Viewer => "viewer",
        }
    }

    fn of(party: &Party, identity: &Identity) -> Self {
        if party.is_host(&identity.uid) {
            Role::Host
        } else {
            Role::Viewer
        }
    }
}

/// Item of the session feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUpdate {
    pub party: Party,
    pub role: Role,
    pub status: SyncStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Create(#[from] CreatePartyError),
    #[error(transparent)]
    Join(#[from] JoinPartyError),
    #[error(transparent)]
    HostControl(#[from] HostControlError),
    #[error(transparent)]
    Chat(#[from] SendMessageError),
    #[error("No party view is open")]
    NoActiveView,
}

struct ActiveView<S: PartyStore + ?Sized> {
    party_id: String,
    role: Role,
    host: Arc<Mutex<HostController<S>>>,
    task: JoinHandle<()>,
}

pub struct PartySession<S, D>
where
    S: PartyStore + ?Sized + 'static,
    D: MediaDevice + ?Sized + 'static,
{
    store: Arc<S>,
    device: Arc<D>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    generation: ViewGeneration,
    view: Mutex<Option<ActiveView<S>>>,
    backoff: Backoff,
    updates_tx: Sender<SessionUpdate>,
    _updates_rx: InactiveReceiver<SessionUpdate>,
}

impl<S, D> PartySession<S, D>
where
    S: PartyStore + ?Sized + 'static,
    D: MediaDevice + ?Sized + 'static,
{
    pub fn new(
        store: Arc<S>,
        device: Arc<D>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (mut updates_tx, updates_rx) = broadcast(UPDATE_CHANNEL_CAPACITY);
        updates_tx.set_overflow(true);
        updates_tx.set_await_active(false);

        Self {
            store,
            device,
            identity,
            clock,
            generation: ViewGeneration::new(),
            view: Mutex::new(None),
            backoff: Backoff::default(),
            updates_tx,
            _updates_rx: updates_rx.deactivate(),
        }
    }

    /// Override the resubscribe backoff
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Feed of snapshots paired with the local synchronizer status
    pub fn updates(&self) -> Receiver<SessionUpdate> {
        self.updates_tx.new_receiver()
    }

    pub async fn party_id(&self) -> Option<String> {
        self.view.lock().await.as_ref().map(|v| v.party_id.clone())
    }

    pub async fn role(&self) -> Option<Role> {
        self.view.lock().await.as_ref().map(|v| v.role)
    }

    /// Create a party hosted by the local identity and open its view
    pub async fn create_party(&self) -> Result<String, SessionError> {
        let identity = self.identity.current_identity()?;
        let party = CreateParty::new(self.store.clone(), self.clock.clone())
            .execute(&identity)
            .await?;
        let party_id = party.id.clone();

        self.open_view(party, identity).await;
        Ok(party_id)
    }

    /// Join an existing party and open its view
    pub async fn join_party(&self, party_id: &str) -> Result<Party, SessionError> {
        let identity = self.identity.current_identity()?;
        let output = JoinParty::new(self.store.clone())
            .execute(party_id, &identity)
            .await?;

        self.open_view(output.party.clone(), identity).await;
        Ok(output.party)
    }

    /// Close the open view and cancel its pending work
    pub async fn leave_view(&self) {
        self.generation.revoke();
        if let Some(view) = self.view.lock().await.take() {
            view.task.abort();
            tracing::info!(party_id = %view.party_id, "Left party view");
        }
    }

    pub async fn change_track(&self, reference: &str) -> Result<Party, SessionError> {
        let host = self.host_controller().await?;
        let party = host.lock().await.change_track(reference).await?;

        if let Some(track) = party.current_track_id.as_ref() {
            let result = match self.device.load(track).await {
                Ok(()) => self.device.play().await,
                Err(e) => Err(e),
            };
            self.report_device(&party, result);
        }
        Ok(party)
    }

    pub async fn play(&self) -> Result<Party, SessionError> {
        let host = self.host_controller().await?;
        let party = host.lock().await.play().await?;
        let result = self.device.play().await;
        self.report_device(&party, result);
        Ok(party)
    }

    pub async fn pause(&self) -> Result<Party, SessionError> {
        let host = self.host_controller().await?;
        let party = host.lock().await.pause().await?;
        let result = self.device.pause().await;
        self.report_device(&party, result);
        Ok(party)
    }

    pub async fn send_message(&self, text: &str) -> Result<Message, SessionError> {
        let identity = self.identity.current_identity()?;
        let party_id = self.party_id().await.ok_or(SessionError::NoActiveView)?;

        let message = SendMessage::new(self.store.clone(), self.clock.clone())
            .execute(&party_id, &identity, text)
            .await?;
        Ok(message)
    }

    async fn host_controller(&self) -> Result<Arc<Mutex<HostController<S>>>, SessionError> {
        self.view
            .lock()
            .await
            .as_ref()
            .map(|v| v.host.clone())
            .ok_or(SessionError::NoActiveView)
    }

    /// Host player failures never undo a commit; they only degrade the status
    fn report_device(&self, party: &Party, result: Result<(), DeviceError>) {
        if let Err(e) = result {
            tracing::warn!(party_id = %party.id, "Host player command failed: {}", e);
            let update = SessionUpdate {
                party: party.clone(),
                role: Role::Host,
                status: SyncStatus::Degraded {
                    reason: e.to_string(),
                },
            };
            let _ = self.updates_tx.try_broadcast(update);
        }
    }

    async fn open_view(&self, party: Party, identity: Identity) {
        let mut view = self.view.lock().await;
        if let Some(previous) = view.take() {
            previous.task.abort();
        }

        let lease = self.generation.renew();
        let role = Role::of(&party, &identity);
        let party_id = party.id.clone();
        let host = Arc::new(Mutex::new(HostController::new(
            self.store.clone(),
            self.clock.clone(),
            identity,
            party,
        )));

        let task = ViewTask {
            party_id: party_id.clone(),
            role,
            store: self.store.clone(),
            device: self.device.clone(),
            clock: self.clock.clone(),
            host: host.clone(),
            lease,
            backoff: self.backoff.clone(),
            updates: self.updates_tx.clone(),
        };

        tracing::info!(party_id = %party_id, role = role.as_str(), "Opened party view");
        *view = Some(ActiveView {
            party_id,
            role,
            host,
            task: tokio::spawn(task.run()),
        });
    }
}

impl<S, D> Drop for PartySession<S, D>
where
    S: PartyStore + ?Sized + 'static,
    D: MediaDevice + ?Sized + 'static,
{
    fn drop(&mut self) {
        self.generation.revoke();
        if let Some(view) = self.view.get_mut().take() {
            view.task.abort();
        }
    }
}

/// Why the snapshot loop of one subscription ended
enum FeedEnd {
    Resubscribe(StoreError),
    Stop,
}

struct ViewTask<S: PartyStore + ?Sized, D: MediaDevice + ?Sized> {
    party_id: String,
    role: Role,
    store: Arc<S>,
    device: Arc<D>,
    clock: Arc<dyn Clock>,
    host: Arc<Mutex<HostController<S>>>,
    lease: SubscriptionLease,
    backoff: Backoff,
    updates: Sender<SessionUpdate>,
}

impl<S: PartyStore + ?Sized, D: MediaDevice + ?Sized> ViewTask<S, D> {
    async fn run(mut self) {
        // Listen before checking readiness so a Ready event cannot slip between
        let mut device_events = self.device.events();
        let mut sync = match self.role {
            Role::Viewer => Some(PlaybackSynchronizer::new(
                self.device.clone(),
                self.clock.clone(),
                self.lease.clone(),
            )),
            Role::Host => None,
        };
        let mut last_party: Option<Party> = None;

        while self.lease.is_current() {
            let end = match self.store.subscribe(&self.party_id).await {
                Ok(mut stream) => {
                    self.follow(&mut stream, &mut device_events, &mut sync, &mut last_party)
                        .await
                }
                Err(e) if e.is_transient() => FeedEnd::Resubscribe(e),
                Err(e) => {
                    tracing::warn!(party_id = %self.party_id, "Subscription failed: {}", e);
                    FeedEnd::Stop
                }
            };

            match end {
                FeedEnd::Stop => break,
                FeedEnd::Resubscribe(e) => {
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        party_id = %self.party_id,
                        delay_ms = delay.as_millis() as u64,
                        "Snapshot feed lost, resubscribing: {}",
                        e
                    );
                    if let Some(party) = last_party.as_ref() {
                        self.publish(
                            party,
                            SyncStatus::Degraded {
                                reason: e.to_string(),
                            },
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }

        tracing::debug!(party_id = %self.party_id, "View task finished");
    }

    async fn follow(
        &mut self,
        stream: &mut SnapshotStream,
        device_events: &mut Receiver<DeviceEvent>,
        sync: &mut Option<PlaybackSynchronizer<D>>,
        last_party: &mut Option<Party>,
    ) -> FeedEnd {
        let mut device_open = true;

        loop {
            if !self.lease.is_current() {
                return FeedEnd::Stop;
            }

            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(party)) => {
                        self.backoff.reset();
                        if last_party.as_ref().is_some_and(|last| last.revision > party.revision) {
                            continue;
                        }
                        self.host.lock().await.observe(&party);

                        let status = match sync.as_mut() {
                            Some(sync) => sync.on_snapshot(&party).await,
                            None => SyncStatus::Hosting,
                        };
                        self.publish(&party, status);
                        *last_party = Some(party);
                    }
                    Some(Err(e)) if e.is_transient() => return FeedEnd::Resubscribe(e),
                    Some(Err(e)) => {
                        tracing::warn!(party_id = %self.party_id, "Snapshot feed failed: {}", e);
                        return FeedEnd::Stop;
                    }
                    None => {
                        return FeedEnd::Resubscribe(StoreError::Unavailable(
                            "snapshot feed ended".into(),
                        ))
                    }
                },
                event = device_events.recv(), if device_open => match event {
                    Ok(event) => self.on_device_event(event, sync, last_party.as_ref()).await,
                    Err(RecvError::Overflowed(skipped)) => {
                        tracing::debug!("Skipped {} device events", skipped);
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!(party_id = %self.party_id, "Device event stream closed");
                        device_open = false;
                    }
                },
            }
        }
    }

    async fn on_device_event(
        &self,
        event: DeviceEvent,
        sync: &mut Option<PlaybackSynchronizer<D>>,
        last_party: Option<&Party>,
    ) {
        match (&event, sync.as_mut()) {
            (DeviceEvent::Ready, Some(sync)) => {
                let status = sync.on_device_ready().await;
                if let Some(party) = last_party {
                    self.publish(party, status);
                }
            }
            (_, None) => {
                let result = self.host.lock().await.on_device_event(&event).await;
                match result {
                    Ok(Some(party)) => {
                        tracing::debug!(party_id = %party.id, "Committed host player action");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(party_id = %self.party_id, "Host player action not committed: {}", e);
                    }
                }
            }
            // Viewers ignore their own player's state changes
            _ => {}
        }
    }

    fn publish(&self, party: &Party, status: SyncStatus) {
        if !self.lease.is_current() {
            return;
        }
        let update = SessionUpdate {
            party: party.clone(),
            role: self.role,
            status,
        };
        if let Err(e) = self.updates.try_broadcast(update) {
            tracing::trace!("Session update dropped: {:?}", e);
        }
    }
}
