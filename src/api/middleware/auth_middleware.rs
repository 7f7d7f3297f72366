use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::infrastructure::app_state::AppState;

// Re-export Claims for use in route handlers
pub use crate::infrastructure::auth::Claims;

fn header_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// `token` query parameter, for EventSource clients that cannot set headers
fn query_token(request: &Request) -> Option<String> {
    request.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("token=")
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
    })
}

fn authorize(state: &AppState, mut request: Request, token: &str) -> Result<Request, StatusCode> {
    let claims = state.jwt_service.verify(token).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    request.extensions_mut().insert(claims);
    Ok(request)
}

/// Extract authenticated user from request
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = header_token(&request)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let request = authorize(&state, request, &token)?;
    Ok(next.run(request).await)
}

/// Like [`auth_middleware`], also accepting `?token=`
pub async fn stream_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = header_token(&request)
        .map(str::to_string)
        .or_else(|| query_token(&request))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let request = authorize(&state, request, &token)?;
    Ok(next.run(request).await)
}
