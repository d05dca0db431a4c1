// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        chat::message_handler,
        listings::{protected_listing_handler, public_listing_handler},
        realtime::ws_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let listing_routes = public_listing_handler()
        .merge(protected_listing_handler().layer(middleware::from_fn(auth)));

    let api_route = Router::new()
        .nest("/listings", listing_routes)
        .nest(
            "/messages",
            message_handler().layer(middleware::from_fn(auth)),
        )
        .route("/healthcheck", get(health_check))
        .layer(TraceLayer::new_for_http());

    Router::new()
        .nest("/api", api_route)
        // The socket authenticates through a token query param, not the
        // auth middleware.
        .route("/ws", get(ws_handler))
        .layer(Extension(app_state))
}
