use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};

use crate::api::routes::party::{store_error_response, ApiError};
use crate::infrastructure::app_state::AppState;

const HEARTBEAT_SECS: u64 = 20;

/// GET /api/party/:partyId/subscribe - Snapshot feed as server-sent events
///
/// Every `snapshot` event carries the full document; the first one is the
/// current document.
pub async fn party_stream_handler(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let mut snapshots = state
        .store
        .subscribe(&party_id)
        .await
        .map_err(store_error_response)?;

    let stream = async_stream::stream! {
        tracing::debug!(party_id = %party_id, "SSE stream started");

        // First tick after one period so the current document goes out first
        let period = Duration::from_secs(HEARTBEAT_SECS);
        let mut heartbeat_interval =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = heartbeat_interval.tick() => {
                    tracing::trace!("SSE heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }
                item = snapshots.next() => {
                    match item {
                        Some(Ok(party)) => {
                            match Event::default().event("snapshot").json_data(&party) {
                                Ok(event) => {
                                    yield Ok(event);
                                }
                                Err(e) => tracing::warn!("Failed to encode snapshot: {}", e),
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(party_id = %party_id, "Snapshot feed error: {}, closing stream", e);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        tracing::debug!(party_id = %party_id, "SSE stream closed");
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
