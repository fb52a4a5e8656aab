//! Review handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lodge_store::{resolver, StorageEngine};
use lodge_types::{Entity, EntityKind, Review};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::{json_object, representations, take_string};
use crate::AppState;

pub async fn list_by_place(
    State(state): State<AppState>,
    Path(place_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let reviews = resolver::reviews_of_place(state.engine.as_ref(), &place_id).await?;
    Ok(Json(representations(reviews)))
}

pub async fn create(
    State(state): State<AppState>,
    Path(place_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    resolver::require(state.engine.as_ref(), EntityKind::Place, &place_id).await?;
    let mut body = json_object(body)?;
    let user_id = take_string(&mut body, "user_id")?;
    resolver::require(state.engine.as_ref(), EntityKind::User, &user_id).await?;
    let text = take_string(&mut body, "text")?;

    let mut entity = Entity::from(Review::new(text, place_id, user_id));
    if !body.is_empty() {
        entity.apply_update(&body)?;
    }
    state.engine.stage(entity.clone()).await?;
    state.engine.save().await?;
    Ok((StatusCode::CREATED, Json(entity.to_representation())))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let entity = resolver::require(state.engine.as_ref(), EntityKind::Review, &id).await?;
    Ok(Json(entity.to_representation()))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let patch = json_object(body)?;
    let mut entity = resolver::require(state.engine.as_ref(), EntityKind::Review, &id).await?;
    entity.apply_update(&patch)?;
    state.engine.stage(entity.clone()).await?;
    state.engine.save().await?;
    Ok(Json(entity.to_representation()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let entity = resolver::require(state.engine.as_ref(), EntityKind::Review, &id).await?;
    state.engine.delete(Some(&entity)).await?;
    state.engine.save().await?;
    Ok(Json(json!({})))
}
