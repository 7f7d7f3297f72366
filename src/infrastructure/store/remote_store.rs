//! HTTP client for a party store served by this backend
//!
//! Mirrors the `/api/party` routes; subscriptions follow the SSE feed.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::domain::entities::Party;
use crate::domain::repositories::{PartyStore, SnapshotStream, StoreError};
use crate::domain::value_objects::PartyUpdate;

/// Remote store configuration
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct PartyEnvelope {
    party: Party,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// One parsed server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

pub struct RemotePartyStore {
    client: Client,
    /// Separate client without a request timeout for long-lived streams
    stream_client: Client,
    config: RemoteStoreConfig,
}

impl RemotePartyStore {
    pub fn new(config: RemoteStoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!("RemotePartyStore initialized: {}", config.base_url);

        Ok(Self {
            client,
            stream_client,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/party{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.config.bearer_token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        check_status(response).await
    }

    async fn party_from(response: Response) -> Result<Party, StoreError> {
        response
            .json::<PartyEnvelope>()
            .await
            .map(|envelope| envelope.party)
            .map_err(|e| StoreError::Unavailable(format!("invalid response: {}", e)))
    }
}

/// Map HTTP failures onto the store taxonomy
async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());

    Err(match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::FORBIDDEN => StoreError::PermissionDenied(message),
        StatusCode::CONFLICT => StoreError::AlreadyExists(message),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Unavailable(message)
        }
        _ => StoreError::Rejected(message),
    })
}

/// Move the decodable prefix of `pending` into `buffer`.
///
/// Chunks may split a multi-byte character, so an incomplete tail stays in
/// `pending` for the next chunk. Bytes that can never decode end the feed.
fn decode_utf8_chunk(pending: &mut Vec<u8>, buffer: &mut String) -> Result<(), StoreError> {
    let valid = match std::str::from_utf8(pending) {
        Ok(text) => text.len(),
        Err(e) if e.error_len().is_some() => {
            return Err(StoreError::Unavailable(format!(
                "snapshot feed is not UTF-8: {}",
                e
            )));
        }
        Err(e) => e.valid_up_to(),
    };
    buffer.push_str(std::str::from_utf8(&pending[..valid]).unwrap_or_default());
    pending.drain(..valid);
    Ok(())
}

/// Drain complete frames (terminated by a blank line) from `buffer`
pub fn drain_sse_frames(buffer: &mut String) -> Vec<SseFrame> {
    let mut frames = Vec::new();

    loop {
        let normalized = buffer.replace("\r\n", "\n");
        *buffer = normalized;
        let Some(end) = buffer.find("\n\n") else {
            break;
        };
        let raw: String = buffer.drain(..end + 2).collect();

        let mut event = None;
        let mut data_lines = Vec::new();
        for line in raw.lines() {
            if let Some(value) = line.strip_prefix("event:") {
                event = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                data_lines.push(value.strip_prefix(' ').unwrap_or(value));
            }
            // Comments (":") and unknown fields are ignored
        }

        if !data_lines.is_empty() {
            frames.push(SseFrame {
                event,
                data: data_lines.join("\n"),
            });
        }
    }

    frames
}

#[async_trait]
impl PartyStore for RemotePartyStore {
    async fn create(&self, initial: Party) -> Result<String, StoreError> {
        let response = self.send(self.client.post(self.url("")).json(&initial)).await?;
        Ok(Self::party_from(response).await?.id)
    }

    async fn get(&self, party_id: &str) -> Result<Party, StoreError> {
        let response = self
            .send(self.client.get(self.url(&format!("/{}", party_id))))
            .await?;
        Self::party_from(response).await
    }

    async fn subscribe(&self, party_id: &str) -> Result<SnapshotStream, StoreError> {
        let response = self
            .send(
                self.stream_client
                    .get(self.url(&format!("/{}/subscribe", party_id)))
                    .header("Accept", "text/event-stream"),
            )
            .await?;

        let mut body = response.bytes_stream();
        let party_id = party_id.to_string();

        Ok(Box::pin(async_stream::stream! {
            let mut pending: Vec<u8> = Vec::new();
            let mut buffer = String::new();
            loop {
                match body.next().await {
                    Some(Ok(chunk)) => {
                        pending.extend_from_slice(&chunk);
                        if let Err(e) = decode_utf8_chunk(&mut pending, &mut buffer) {
                            yield Err(e);
                            break;
                        }

                        for frame in drain_sse_frames(&mut buffer) {
                            if frame.event.as_deref() != Some("snapshot") {
                                continue;
                            }
                            match serde_json::from_str::<Party>(&frame.data) {
                                Ok(party) => {
                                    yield Ok(party);
                                }
                                Err(e) => tracing::warn!("Discarding malformed snapshot: {}", e),
                            }
                        }
                    }
                    Some(Err(e)) => {
                        yield Err(StoreError::Unavailable(e.to_string()));
                        break;
                    }
                    None => {
                        tracing::debug!(party_id = %party_id, "Snapshot feed closed by server");
                        yield Err(StoreError::Unavailable("snapshot feed closed".into()));
                        break;
                    }
                }
            }
        }))
    }

    async fn update(&self, party_id: &str, update: PartyUpdate) -> Result<Party, StoreError> {
        let response = self
            .send(
                self.client
                    .patch(self.url(&format!("/{}", party_id)))
                    .json(&update),
            )
            .await?;
        Self::party_from(response).await
    }
}
