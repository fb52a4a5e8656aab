//! Relationship resolution
//!
//! One code path for both backends: parents are existence-checked here, then
//! children are fetched through the engine contract. Call sites never branch
//! on backend kind.

use lodge_types::{Entity, EntityKind, ParentLink};

use crate::engine::{LinkOutcome, StorageEngine};
use crate::error::{Result, StoreError};

/// Fetch one entity or fail with `NotFound`.
pub async fn require(engine: &dyn StorageEngine, kind: EntityKind, id: &str) -> Result<Entity> {
    engine
        .get(kind, id)
        .await?
        .ok_or_else(|| StoreError::not_found(kind, id))
}

/// Cities of a state, in insertion order. `NotFound` when the state itself
/// does not exist; an empty list when it merely has no cities.
pub async fn cities_of_state(engine: &dyn StorageEngine, state_id: &str) -> Result<Vec<Entity>> {
    require(engine, EntityKind::State, state_id).await?;
    engine
        .children(EntityKind::City, ParentLink::StateId, state_id)
        .await
}

/// Places of a city, in insertion order.
pub async fn places_of_city(engine: &dyn StorageEngine, city_id: &str) -> Result<Vec<Entity>> {
    require(engine, EntityKind::City, city_id).await?;
    engine
        .children(EntityKind::Place, ParentLink::CityId, city_id)
        .await
}

/// Places owned by a user, in insertion order.
pub async fn places_of_user(engine: &dyn StorageEngine, user_id: &str) -> Result<Vec<Entity>> {
    require(engine, EntityKind::User, user_id).await?;
    engine
        .children(EntityKind::Place, ParentLink::UserId, user_id)
        .await
}

/// Reviews of a place, in insertion order.
pub async fn reviews_of_place(engine: &dyn StorageEngine, place_id: &str) -> Result<Vec<Entity>> {
    require(engine, EntityKind::Place, place_id).await?;
    engine
        .children(EntityKind::Review, ParentLink::PlaceId, place_id)
        .await
}

/// Reviews written by a user, in insertion order.
pub async fn reviews_of_user(engine: &dyn StorageEngine, user_id: &str) -> Result<Vec<Entity>> {
    require(engine, EntityKind::User, user_id).await?;
    engine
        .children(EntityKind::Review, ParentLink::UserId, user_id)
        .await
}

/// Amenities linked to a place, in link order.
pub async fn amenities_of_place(engine: &dyn StorageEngine, place_id: &str) -> Result<Vec<Entity>> {
    require(engine, EntityKind::Place, place_id).await?;
    engine.amenities_of(place_id).await
}

/// Link an amenity to a place. Returns the amenity and whether the link was
/// freshly created; linking twice reports `Existing` and changes nothing.
pub async fn link_amenity(
    engine: &dyn StorageEngine,
    place_id: &str,
    amenity_id: &str,
) -> Result<(Entity, LinkOutcome)> {
    require(engine, EntityKind::Place, place_id).await?;
    let amenity = require(engine, EntityKind::Amenity, amenity_id).await?;
    let outcome = engine.link_amenity(place_id, amenity_id).await?;
    Ok((amenity, outcome))
}

/// Unlink an amenity from a place. Unlinking an amenity that was never
/// linked is `NotFound`.
pub async fn unlink_amenity(
    engine: &dyn StorageEngine,
    place_id: &str,
    amenity_id: &str,
) -> Result<()> {
    require(engine, EntityKind::Place, place_id).await?;
    require(engine, EntityKind::Amenity, amenity_id).await?;
    engine.unlink_amenity(place_id, amenity_id).await
}
