use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::Serialize;

use crate::api::middleware::Claims;
use crate::api::AppState;
use crate::application::party::{
    authorize_create, authorize_update, bound_playback_timestamp, CreateParty, WriteRejected,
};
use crate::domain::entities::Party;
use crate::domain::ports::Clock;
use crate::domain::repositories::StoreError;
use crate::domain::value_objects::PartyUpdate;

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PartyEnvelope {
    pub party: Party,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: &str, details: Option<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
            details,
        }),
    )
}

pub fn store_error_response(e: StoreError) -> ApiError {
    let (status, code, error) = match &e {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "PARTY_NOT_FOUND", "Party not found"),
        StoreError::AlreadyExists(_) => (StatusCode::CONFLICT, "PARTY_EXISTS", "Party already exists"),
        StoreError::PermissionDenied(_) => {
            (StatusCode::FORBIDDEN, "PERMISSION_DENIED", "Permission denied")
        }
        StoreError::Rejected(_) => (StatusCode::BAD_REQUEST, "INVALID_DOCUMENT", "Invalid document"),
        StoreError::Unavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "STORE_UNAVAILABLE",
            "Party store unavailable",
        ),
        StoreError::Database(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "STORE_ERROR",
            "Party store error",
        ),
    };
    if status.is_server_error() {
        tracing::error!("Store failure: {}", e);
    }
    api_error(status, code, error, Some(e.to_string()))
}

fn invalid_body(e: serde_json::Error) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "INVALID_DOCUMENT",
        "Invalid document",
        Some(e.to_string()),
    )
}

fn rejected_response(e: WriteRejected) -> ApiError {
    match e {
        WriteRejected::PermissionDenied(reason) => api_error(
            StatusCode::FORBIDDEN,
            "PERMISSION_DENIED",
            "Permission denied",
            Some(reason),
        ),
        WriteRejected::Invalid(reason) => api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_DOCUMENT",
            "Invalid document",
            Some(reason),
        ),
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /api/party - Create a party hosted by the caller
///
/// An empty body lets the server build the initial document; otherwise the
/// body is the initial document and must name the caller as sole host.
pub async fn create_party(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<(StatusCode, Json<PartyEnvelope>), ApiError> {
    let caller = claims.identity();

    let party = if body.iter().all(u8::is_ascii_whitespace) {
        CreateParty::new(state.store.clone(), state.clock.clone())
            .execute(&caller)
            .await
            .map_err(|e| {
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CREATE_PARTY_ERROR",
                    "Failed to create party",
                    Some(e.to_string()),
                )
            })?
    } else {
        let initial: Party = serde_json::from_slice(&body).map_err(invalid_body)?;
        authorize_create(&initial, &caller).map_err(rejected_response)?;

        let party_id = state
            .store
            .create(initial)
            .await
            .map_err(store_error_response)?;
        state
            .store
            .get(&party_id)
            .await
            .map_err(store_error_response)?
    };

    Ok((StatusCode::CREATED, Json(PartyEnvelope { party })))
}

/// GET /api/party/:partyId - Full party document
pub async fn get_party(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<String>,
) -> Result<Json<PartyEnvelope>, ApiError> {
    let party = state
        .store
        .get(&party_id)
        .await
        .map_err(store_error_response)?;
    Ok(Json(PartyEnvelope { party }))
}

/// PATCH /api/party/:partyId - Merge a partial update
pub async fn update_party(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<String>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<Json<PartyEnvelope>, ApiError> {
    let caller = claims.identity();
    let mut update: PartyUpdate = serde_json::from_slice(&body).map_err(invalid_body)?;

    // Host and existing members never change, so a prior read is enough
    let current = state
        .store
        .get(&party_id)
        .await
        .map_err(store_error_response)?;
    authorize_update(&current, &caller, &update).map_err(|e| {
        tracing::warn!(party_id = %party_id, uid = %caller.uid, "Write rejected: {}", e);
        rejected_response(e)
    })?;
    bound_playback_timestamp(&mut update, state.clock.now_millis());

    let party = state
        .store
        .update(&party_id, update)
        .await
        .map_err(store_error_response)?;
    Ok(Json(PartyEnvelope { party }))
}
