//! Remote store tests against a live server on a local port

use std::sync::Arc;
use std::time::Duration;

use async_broadcast::{Receiver, RecvError};
use tokio::net::TcpListener;

use watchparty_backend::api;
use watchparty_backend::application::playback::SyncStatus;
use watchparty_backend::application::session::{PartySession, SessionUpdate};
use watchparty_backend::domain::entities::Party;
use watchparty_backend::domain::repositories::{PartyStore, StoreError};
use watchparty_backend::domain::value_objects::{Identity, PartyUpdate, PlayerState};
use watchparty_backend::infrastructure::app_state::AppState;
use watchparty_backend::infrastructure::auth::BearerIdentity;
use watchparty_backend::infrastructure::config::AppConfig;
use watchparty_backend::infrastructure::device::{DeviceCommand, HeadlessDevice};
use watchparty_backend::infrastructure::services::ManualClock;
use watchparty_backend::infrastructure::store::{RemotePartyStore, RemoteStoreConfig};

/// Start the server and return its base URL with tokens for alice and bob
async fn start_server() -> (String, String, String) {
    let state = Arc::new(
        AppState::with_config(AppConfig::in_memory("remote-test-secret"))
            .await
            .unwrap(),
    );
    let alice = state
        .jwt_service
        .sign(&Identity::new("alice", "Alice"))
        .unwrap();
    let bob = state.jwt_service.sign(&Identity::new("bob", "Bob")).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api::routes::create_app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), alice, bob)
}

fn remote(base_url: &str, token: &str) -> Arc<RemotePartyStore> {
    Arc::new(
        RemotePartyStore::new(RemoteStoreConfig {
            base_url: base_url.to_string(),
            bearer_token: token.to_string(),
            timeout_secs: 5,
        })
        .unwrap(),
    )
}

async fn wait_for<F>(updates: &mut Receiver<SessionUpdate>, predicate: F) -> SessionUpdate
where
    F: Fn(&SessionUpdate) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match updates.recv().await {
                Ok(update) if predicate(&update) => return update,
                Ok(_) | Err(RecvError::Overflowed(_)) => continue,
                Err(RecvError::Closed) => panic!("session feed closed"),
            }
        }
    })
    .await
    .expect("expected session update did not arrive")
}

#[tokio::test]
async fn test_store_operations_over_http() {
    let (base_url, alice, bob) = start_server().await;
    let a_store = remote(&base_url, &alice);
    let b_store = remote(&base_url, &bob);

    let party = Party::new("remote-p1".into(), &Identity::new("alice", "Alice"), 1);
    let party_id = a_store.create(party.clone()).await.unwrap();
    assert_eq!(party_id, "remote-p1");
    assert!(matches!(
        a_store.create(party).await,
        Err(StoreError::AlreadyExists(_))
    ));

    let joined = b_store
        .update(&party_id, PartyUpdate::add_member(Identity::new("bob", "Bob").as_member()))
        .await
        .unwrap();
    assert_eq!(joined.members.len(), 2);

    // The server enforces host authority even when a client skips the guard
    let forged = PartyUpdate::playback(PlayerState::Paused, None, 99);
    assert!(matches!(
        b_store.update(&party_id, forged).await,
        Err(StoreError::PermissionDenied(_))
    ));

    assert!(matches!(
        b_store.get("missing").await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    let store = remote("http://127.0.0.1:9", "token");
    let result = store.get("p1").await;
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn test_sessions_over_http() {
    let (base_url, alice, bob) = start_server().await;
    let clock = Arc::new(ManualClock::new(50_000));
    let b_device = Arc::new(HeadlessDevice::ready(clock.clone()));

    let a = PartySession::new(
        remote(&base_url, &alice),
        Arc::new(HeadlessDevice::ready(clock.clone())),
        Arc::new(BearerIdentity::from_token(alice.clone()).unwrap()),
        clock.clone(),
    );
    let b = PartySession::new(
        remote(&base_url, &bob),
        b_device.clone(),
        Arc::new(BearerIdentity::from_token(bob.clone()).unwrap()),
        clock.clone(),
    );

    let party_id = a.create_party().await.unwrap();
    let mut b_updates = b.updates();
    b.join_party(&party_id).await.unwrap();
    wait_for(&mut b_updates, |u| u.status == SyncStatus::Idle).await;

    clock.advance(250);
    a.change_track("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        .await
        .unwrap();

    let update = wait_for(&mut b_updates, |u| matches!(u.status, SyncStatus::Synced { .. })).await;
    assert_eq!(update.party.player_state, PlayerState::Playing);
    assert_eq!(
        update.party.current_track_id.as_ref().unwrap().as_str(),
        "dQw4w9WgXcQ"
    );

    let commands = b_device.commands().await;
    assert!(matches!(commands.first(), Some(DeviceCommand::Load(_))));
    assert_eq!(commands.last(), Some(&DeviceCommand::Play));

    b.send_message("nice pick").await.unwrap();
    let update = wait_for(&mut b_updates, |u| !u.party.messages.is_empty()).await;
    assert_eq!(update.party.messages[0].sender_id, "bob");
}
