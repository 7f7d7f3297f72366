use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::domain::entities::Party;
use crate::domain::repositories::{PartyStore, SnapshotStream, StoreError};
use crate::domain::value_objects::{PartyUpdate, PlayerState, TrackId};
use crate::infrastructure::store::SnapshotHub;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS parties (
    id TEXT PRIMARY KEY,
    host_id TEXT NOT NULL,
    members_json TEXT NOT NULL,
    current_track_id TEXT,
    player_state TEXT NOT NULL,
    playback_timestamp INTEGER NOT NULL,
    messages_json TEXT NOT NULL,
    revision INTEGER NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

/// SQLite implementation of PartyStore
pub struct SqlitePartyStore {
    pool: SqlitePool,
    /// Serializes read-merge-write commits from this process
    commit_lock: Mutex<()>,
    hub: SnapshotHub,
}

impl SqlitePartyStore {
    pub fn new(pool: SqlitePool, channel_capacity: usize) -> Self {
        Self {
            pool,
            commit_lock: Mutex::new(()),
            hub: SnapshotHub::new(channel_capacity),
        }
    }

    /// Create the parties table if needed
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn row_to_party(row: &sqlx::sqlite::SqliteRow) -> Result<Party, StoreError> {
        use sqlx::Row;

        let members_json: String = row.get("members_json");
        let messages_json: String = row.get("messages_json");
        let state_str: String = row.get("player_state");
        let track: Option<String> = row.get("current_track_id");

        Ok(Party {
            id: row.get("id"),
            host_id: row.get("host_id"),
            members: serde_json::from_str(&members_json)
                .map_err(|e| StoreError::Database(format!("members: {}", e)))?,
            current_track_id: track
                .map(TrackId::try_from)
                .transpose()
                .map_err(|e| StoreError::Database(format!("track: {}", e)))?,
            player_state: PlayerState::from_str(&state_str).ok_or_else(|| {
                StoreError::Database(format!("player_state: unknown value {:?}", state_str))
            })?,
            playback_timestamp: row.get("playback_timestamp"),
            messages: serde_json::from_str(&messages_json)
                .map_err(|e| StoreError::Database(format!("messages: {}", e)))?,
            revision: row.get::<i64, _>("revision") as u64,
            created_at: row.get("created_at"),
        })
    }

    async fn fetch<'e, E>(executor: E, party_id: &str) -> Result<Party, StoreError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let row = sqlx::query("SELECT * FROM parties WHERE id = ?")
            .bind(party_id)
            .fetch_optional(executor)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Self::row_to_party(&row),
            None => Err(StoreError::NotFound(party_id.to_string())),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Database(e.to_string()))
}

/// Connectivity problems are transient, everything else is not
fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}

#[async_trait]
impl PartyStore for SqlitePartyStore {
    async fn create(&self, mut initial: Party) -> Result<String, StoreError> {
        let _guard = self.commit_lock.lock().await;
        initial.revision = 1;

        let result = sqlx::query(
            r#"
            INSERT INTO parties (id, host_id, members_json, current_track_id, player_state,
                                 playback_timestamp, messages_json, revision, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&initial.id)
        .bind(&initial.host_id)
        .bind(to_json(&initial.members)?)
        .bind(initial.current_track_id.as_ref().map(|t| t.as_str().to_string()))
        .bind(initial.player_state.as_str())
        .bind(initial.playback_timestamp)
        .bind(to_json(&initial.messages)?)
        .bind(initial.revision as i64)
        .bind(initial.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!(party_id = %initial.id, "Party created");
                Ok(initial.id)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::AlreadyExists(initial.id))
            }
            Err(e) => Err(map_sqlx_error(e)),
        }
    }

    async fn get(&self, party_id: &str) -> Result<Party, StoreError> {
        Self::fetch(&self.pool, party_id).await
    }

    async fn subscribe(&self, party_id: &str) -> Result<SnapshotStream, StoreError> {
        let receiver = self.hub.receiver(party_id).await;
        let current = self.get(party_id).await?;
        Ok(SnapshotHub::stream(current, receiver))
    }

    async fn update(&self, party_id: &str, update: PartyUpdate) -> Result<Party, StoreError> {
        let _guard = self.commit_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let mut party = Self::fetch(&mut *tx, party_id).await?;
        if !party.apply(&update) {
            return Ok(party);
        }
        party.revision += 1;

        sqlx::query(
            r#"
            UPDATE parties
            SET members_json = ?, current_track_id = ?, player_state = ?,
                playback_timestamp = ?, messages_json = ?, revision = ?
            WHERE id = ?
            "#,
        )
        .bind(to_json(&party.members)?)
        .bind(party.current_track_id.as_ref().map(|t| t.as_str().to_string()))
        .bind(party.player_state.as_str())
        .bind(party.playback_timestamp)
        .bind(to_json(&party.messages)?)
        .bind(party.revision as i64)
        .bind(party_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        self.hub.publish(&party).await;
        Ok(party)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::domain::entities::Message;
    use crate::domain::value_objects::Identity;

    async fn test_store() -> SqlitePartyStore {
        // One connection so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqlitePartyStore::new(pool, 16);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_round_trip_through_sqlite() {
        let store = test_store().await;
        let alice = Identity::new("alice", "Alice");
        store.create(Party::new("p1".into(), &alice, 7)).await.unwrap();

        let track = TrackId::parse("ref:VID123").unwrap();
        store
            .update(
                "p1",
                PartyUpdate::playback(PlayerState::Playing, Some(track.clone()), 99),
            )
            .await
            .unwrap();
        store
            .update("p1", PartyUpdate::add_message(Message::new(&alice, "hello", 100)))
            .await
            .unwrap();

        let party = store.get("p1").await.unwrap();
        assert_eq!(party.current_track_id, Some(track));
        assert_eq!(party.player_state, PlayerState::Playing);
        assert_eq!(party.playback_timestamp, 99);
        assert_eq!(party.messages[0].text, "hello");
        assert_eq!(party.revision, 3);
        assert_eq!(party.created_at, 7);
    }

    #[tokio::test]
    async fn test_duplicate_create_and_missing_party() {
        let store = test_store().await;
        let alice = Identity::new("alice", "Alice");
        store.create(Party::new("p1".into(), &alice, 0)).await.unwrap();

        assert!(matches!(
            store.create(Party::new("p1".into(), &alice, 0)).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(matches!(store.get("p2").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupt_player_state_is_a_database_error() {
        let store = test_store().await;
        store
            .create(Party::new("p1".into(), &Identity::new("alice", "Alice"), 0))
            .await
            .unwrap();
        sqlx::query("UPDATE parties SET player_state = 'rewinding' WHERE id = 'p1'")
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(store.get("p1").await, Err(StoreError::Database(_))));
    }

    #[tokio::test]
    async fn test_subscriber_sees_commits() {
        let store = test_store().await;
        let alice = Identity::new("alice", "Alice");
        store.create(Party::new("p1".into(), &alice, 0)).await.unwrap();

        let mut stream = store.subscribe("p1").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().revision, 1);

        store
            .update("p1", PartyUpdate::add_member(Identity::new("bob", "Bob").as_member()))
            .await
            .unwrap();
        let party = stream.next().await.unwrap().unwrap();
        assert_eq!(party.members.len(), 2);
    }
}
