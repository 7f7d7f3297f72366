pub mod health;
pub mod party;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::middleware::{auth_middleware, stream_auth_middleware};
use crate::api::sse::party_stream_handler;
use crate::api::AppState;

/// Create the main API router
pub fn create_api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/party", create_party_router(state.clone()))
        .route("/health", get(health::health_handler))
        .with_state(state)
}

/// Create party router
fn create_party_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(party::create_party).layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .route(
            "/:partyId",
            get(party::get_party)
                .patch(party::update_party)
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .route(
            "/:partyId/subscribe",
            get(party_stream_handler).layer(middleware::from_fn_with_state(
                state.clone(),
                stream_auth_middleware,
            )),
        )
        .with_state(state)
}

/// Full application router with CORS and request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    Router::new()
        .nest("/api", create_api_router(state.clone()))
        .route("/health", get(health::health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
