use axum::{routing::get, Router};
use banter::{websocket_handler, AppState, InMemoryRoomRegistry};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LISTEN_ADDR: &str = "0.0.0.0:8001";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting banter chat relay");

    // The registry is the only shared state; it is built here and injected,
    // never reached through a global.
    let registry = Arc::new(InMemoryRoomRegistry::new());
    let app_state = AppState::new(registry);

    // A single route: every connection speaks the same protocol and tells
    // us via its init request whether it creates or joins.
    let app = Router::new()
        .route("/", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await.unwrap();
    info!("Relay listening on ws://{}", LISTEN_ADDR);
    axum::serve(listener, app).await.unwrap();
}
