//! HTTP handlers

pub mod amenities;
pub mod cities;
pub mod index;
pub mod place_amenities;
pub mod places;
pub mod reviews;
pub mod states;
pub mod users;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use lodge_store::StoreError;
use lodge_types::Entity;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Decode a request body into a JSON object, or 400 "Not a JSON".
pub(crate) fn json_object(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Map<String, Value>, ApiError> {
    let Json(value) = body.map_err(|_| ApiError::NotJson)?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::NotJson),
    }
}

/// Take a required string field out of a creation body.
pub(crate) fn take_string(
    body: &mut Map<String, Value>,
    field: &'static str,
) -> Result<String, ApiError> {
    match body.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ApiError::Store(StoreError::Validation(format!(
            "field `{field}` has the wrong type"
        )))),
        None => Err(ApiError::MissingField(field)),
    }
}

/// Entity list response: representations ordered by creation time.
pub(crate) fn representations(mut entities: Vec<Entity>) -> Value {
    entities.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
    Value::Array(entities.iter().map(Entity::to_representation).collect())
}
