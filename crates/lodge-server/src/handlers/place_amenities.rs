//! Place-amenity link handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lodge_store::{resolver, LinkOutcome, StorageEngine};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::representations;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    Path(place_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let amenities = resolver::amenities_of_place(state.engine.as_ref(), &place_id).await?;
    Ok(Json(representations(amenities)))
}

/// Link an amenity to a place: 201 for a fresh association, 200 when it
/// already existed. Both respond with the amenity.
pub async fn link(
    State(state): State<AppState>,
    Path((place_id, amenity_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (amenity, outcome) =
        resolver::link_amenity(state.engine.as_ref(), &place_id, &amenity_id).await?;
    state.engine.save().await?;
    let status = match outcome {
        LinkOutcome::Created => StatusCode::CREATED,
        LinkOutcome::Existing => StatusCode::OK,
    };
    Ok((status, Json(amenity.to_representation())))
}

pub async fn unlink(
    State(state): State<AppState>,
    Path((place_id, amenity_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    resolver::unlink_amenity(state.engine.as_ref(), &place_id, &amenity_id).await?;
    state.engine.save().await?;
    Ok(Json(json!({})))
}
