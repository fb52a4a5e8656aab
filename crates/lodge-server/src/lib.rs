//! Lodge Server
//!
//! REST surface over the dual-mode storage engine. Handlers are thin glue:
//! decode the body, call the engine/resolver, encode the representation.
//! The backend behind the engine is an operational detail the routes never
//! see.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use lodge_store::StorageEngine;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn StorageEngine>,
}

/// Build the application router over an already-reloaded engine.
pub fn app(engine: Arc<dyn StorageEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .nest("/api/v1", api_routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            close_unit_of_work,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::index::status))
        .route("/stats", get(handlers::index::stats))
        .route(
            "/states",
            get(handlers::states::list).post(handlers::states::create),
        )
        .route(
            "/states/:id",
            get(handlers::states::get)
                .put(handlers::states::update)
                .delete(handlers::states::delete),
        )
        .route(
            "/states/:id/cities",
            get(handlers::cities::list_by_state).post(handlers::cities::create),
        )
        .route(
            "/cities/:id",
            get(handlers::cities::get)
                .put(handlers::cities::update)
                .delete(handlers::cities::delete),
        )
        .route(
            "/cities/:id/places",
            get(handlers::places::list_by_city).post(handlers::places::create),
        )
        .route(
            "/places/:id",
            get(handlers::places::get)
                .put(handlers::places::update)
                .delete(handlers::places::delete),
        )
        .route(
            "/places/:id/reviews",
            get(handlers::reviews::list_by_place).post(handlers::reviews::create),
        )
        .route(
            "/reviews/:id",
            get(handlers::reviews::get)
                .put(handlers::reviews::update)
                .delete(handlers::reviews::delete),
        )
        .route(
            "/places/:id/amenities",
            get(handlers::place_amenities::list),
        )
        .route(
            "/places/:id/amenities/:amenity_id",
            post(handlers::place_amenities::link).delete(handlers::place_amenities::unlink),
        )
        .route(
            "/amenities",
            get(handlers::amenities::list).post(handlers::amenities::create),
        )
        .route(
            "/amenities/:id",
            get(handlers::amenities::get)
                .put(handlers::amenities::update)
                .delete(handlers::amenities::delete),
        )
        .route(
            "/users",
            get(handlers::users::list).post(handlers::users::create),
        )
        .route(
            "/users/:id",
            get(handlers::users::get)
                .put(handlers::users::update)
                .delete(handlers::users::delete),
        )
}

/// End the storage unit of work at request teardown, also when the handler
/// failed, so no session state leaks across requests.
async fn close_unit_of_work(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if let Err(e) = state.engine.close().await {
        tracing::error!("failed to close storage engine: {e}");
    }
    response
}

async fn not_found() -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found" })),
    )
}
