//! Service status and per-kind counts

use axum::extract::State;
use axum::Json;
use lodge_store::StorageEngine;
use lodge_types::EntityKind;
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    amenities: u64,
    cities: u64,
    places: u64,
    reviews: u64,
    states: u64,
    users: u64,
}

pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "OK" })
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let engine = state.engine.as_ref();
    Ok(Json(StatsResponse {
        amenities: engine.count(Some(EntityKind::Amenity)).await?,
        cities: engine.count(Some(EntityKind::City)).await?,
        places: engine.count(Some(EntityKind::Place)).await?,
        reviews: engine.count(Some(EntityKind::Review)).await?,
        states: engine.count(Some(EntityKind::State)).await?,
        users: engine.count(Some(EntityKind::User)).await?,
    }))
}
