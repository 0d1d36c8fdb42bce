//! Livecast Web
//!
//! Axum WebSocket transport for livecast: serves the `/cable` endpoint,
//! accepts or rejects subscriptions by verifying signed stream tokens, and
//! fans broadcasts out to subscribed sockets.

pub mod state;
pub mod websocket;

use std::sync::Arc;

use axum::{routing::get, Router};
use livecast_core::stream_name::StreamTarget;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use state::CableState;

/// Create the cable router.
pub fn create_router(state: Arc<CableState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cable", get(websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Signed stream token for a target, for embedding in page props.
///
/// The client hands this back verbatim when subscribing; it is the only
/// thing a page needs to reconstruct a live subscription.
pub fn signed_stream_prop(state: &CableState, target: impl Into<StreamTarget>) -> String {
    state.verifier().signed_stream_name(target)
}

/// Run the cable server.
pub async fn run_server(state: Arc<CableState>, port: u16) -> std::io::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    tracing::info!("Cable server listening on http://127.0.0.1:{port}");

    axum::serve(listener, app).await
}
