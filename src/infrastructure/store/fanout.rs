use std::collections::HashMap;

use async_broadcast::{broadcast, InactiveReceiver, Receiver, RecvError, Sender};
use tokio::sync::RwLock;

use crate::domain::entities::Party;
use crate::domain::repositories::SnapshotStream;

/// Per-party snapshot broadcaster shared by the store backends
pub struct SnapshotHub {
    capacity: usize,
    channels: RwLock<HashMap<String, (Sender<Party>, InactiveReceiver<Party>)>>,
}

impl SnapshotHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Receiver for future commits of `party_id`
    pub async fn receiver(&self, party_id: &str) -> Receiver<Party> {
        if let Some((sender, _)) = self.channels.read().await.get(party_id) {
            return sender.new_receiver();
        }

        let mut channels = self.channels.write().await;
        let (sender, _) = channels.entry(party_id.to_string()).or_insert_with(|| {
            let (mut sender, receiver) = broadcast(self.capacity);
            // Slow subscribers skip to newer snapshots instead of blocking commits
            sender.set_overflow(true);
            sender.set_await_active(false);
            (sender, receiver.deactivate())
        });
        sender.new_receiver()
    }

    /// Fan a committed snapshot out to current subscribers
    pub async fn publish(&self, party: &Party) {
        let channels = self.channels.read().await;
        let Some((sender, _)) = channels.get(&party.id) else {
            return;
        };

        let receiver_count = sender.receiver_count();
        tracing::debug!(
            party_id = %party.id,
            revision = party.revision,
            receivers = receiver_count,
            "Publishing snapshot"
        );
        if receiver_count == 0 {
            return;
        }
        if let Err(e) = sender.try_broadcast(party.clone()) {
            tracing::warn!("Failed to broadcast snapshot: {:?}", e);
        }
    }

    /// Build a subscription stream that starts with `current`.
    ///
    /// Snapshots at or below an already yielded revision are dropped, so a
    /// commit racing the initial read is delivered once.
    pub fn stream(current: Party, mut receiver: Receiver<Party>) -> SnapshotStream {
        Box::pin(async_stream::stream! {
            let mut last_revision = current.revision;
            yield Ok(current);

            loop {
                match receiver.recv().await {
                    Ok(party) => {
                        if party.revision > last_revision {
                            last_revision = party.revision;
                            yield Ok(party);
                        }
                    }
                    Err(RecvError::Overflowed(skipped)) => {
                        tracing::debug!("Subscriber skipped {} snapshots", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
