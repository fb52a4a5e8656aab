//! The entity sum type and its shared contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{Amenity, City, Place, Review, State, User};

/// The six entity kinds the storage engine knows about.
///
/// Replaces class-name-string dispatch: lookups and storage keys go through
/// this enum, never through free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    State,
    City,
    User,
    Amenity,
    Place,
    Review,
}

impl EntityKind {
    /// Every kind, in a stable order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::State,
        EntityKind::City,
        EntityKind::User,
        EntityKind::Amenity,
        EntityKind::Place,
        EntityKind::Review,
    ];
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::State => "State",
            EntityKind::City => "City",
            EntityKind::User => "User",
            EntityKind::Amenity => "Amenity",
            EntityKind::Place => "Place",
            EntityKind::Review => "Review",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for EntityKind {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "State" => Ok(EntityKind::State),
            "City" => Ok(EntityKind::City),
            "User" => Ok(EntityKind::User),
            "Amenity" => Ok(EntityKind::Amenity),
            "Place" => Ok(EntityKind::Place),
            "Review" => Ok(EntityKind::Review),
            other => Err(UpdateError::UnknownKind(other.to_string())),
        }
    }
}

/// Foreign keys a child entity can carry, used for one-to-many resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLink {
    StateId,
    CityId,
    UserId,
    PlaceId,
}

impl ParentLink {
    /// The field (and column) name of the foreign key.
    pub fn field(&self) -> &'static str {
        match self {
            ParentLink::StateId => "state_id",
            ParentLink::CityId => "city_id",
            ParentLink::UserId => "user_id",
            ParentLink::PlaceId => "place_id",
        }
    }
}

/// One domain record of any kind.
///
/// Internally tagged so the kind discriminator travels with the record; the
/// serde form is also the persisted file-mode form, so ids and timestamps
/// round-trip exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Entity {
    State(State),
    City(City),
    User(User),
    Amenity(Amenity),
    Place(Place),
    Review(Review),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::State(_) => EntityKind::State,
            Entity::City(_) => EntityKind::City,
            Entity::User(_) => EntityKind::User,
            Entity::Amenity(_) => EntityKind::Amenity,
            Entity::Place(_) => EntityKind::Place,
            Entity::Review(_) => EntityKind::Review,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::State(e) => &e.id,
            Entity::City(e) => &e.id,
            Entity::User(e) => &e.id,
            Entity::Amenity(e) => &e.id,
            Entity::Place(e) => &e.id,
            Entity::Review(e) => &e.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Entity::State(e) => e.created_at,
            Entity::City(e) => e.created_at,
            Entity::User(e) => e.created_at,
            Entity::Amenity(e) => e.created_at,
            Entity::Place(e) => e.created_at,
            Entity::Review(e) => e.created_at,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Entity::State(e) => e.updated_at,
            Entity::City(e) => e.updated_at,
            Entity::User(e) => e.updated_at,
            Entity::Amenity(e) => e.updated_at,
            Entity::Place(e) => e.updated_at,
            Entity::Review(e) => e.updated_at,
        }
    }

    /// Refresh `updated_at`. Called on every successful mutation.
    pub fn touch(&mut self) {
        let now = Utc::now();
        match self {
            Entity::State(e) => e.updated_at = now,
            Entity::City(e) => e.updated_at = now,
            Entity::User(e) => e.updated_at = now,
            Entity::Amenity(e) => e.updated_at = now,
            Entity::Place(e) => e.updated_at = now,
            Entity::Review(e) => e.updated_at = now,
        }
    }

    /// The storage key, `"Kind.id"`.
    pub fn storage_key(&self) -> String {
        format!("{}.{}", self.kind(), self.id())
    }

    /// The foreign key value for `link`, if this entity carries one.
    pub fn parent_id(&self, link: ParentLink) -> Option<&str> {
        match (self, link) {
            (Entity::City(e), ParentLink::StateId) => Some(&e.state_id),
            (Entity::Place(e), ParentLink::CityId) => Some(&e.city_id),
            (Entity::Place(e), ParentLink::UserId) => Some(&e.user_id),
            (Entity::Review(e), ParentLink::UserId) => Some(&e.user_id),
            (Entity::Review(e), ParentLink::PlaceId) => Some(&e.place_id),
            _ => None,
        }
    }

    /// The wire representation: every public field plus the `kind`
    /// discriminator, timestamps as RFC 3339 strings, secrets stripped.
    pub fn to_representation(&self) -> Value {
        let mut value = serde_json::to_value(self).expect("entity serializes to JSON");
        if let Some(map) = value.as_object_mut() {
            map.remove("password_digest");
        }
        value
    }

    /// Apply an allow-listed field update and refresh `updated_at`.
    ///
    /// Unknown keys and immutable keys (id, timestamps, foreign keys) are
    /// rejected, not ignored.
    pub fn apply_update(&mut self, patch: &Map<String, Value>) -> Result<(), UpdateError> {
        match self {
            Entity::State(e) => e.apply_update(patch)?,
            Entity::City(e) => e.apply_update(patch)?,
            Entity::User(e) => e.apply_update(patch)?,
            Entity::Amenity(e) => e.apply_update(patch)?,
            Entity::Place(e) => e.apply_update(patch)?,
            Entity::Review(e) => e.apply_update(patch)?,
        }
        if !patch.is_empty() {
            self.touch();
        }
        Ok(())
    }
}

impl From<State> for Entity {
    fn from(e: State) -> Self {
        Entity::State(e)
    }
}

impl From<City> for Entity {
    fn from(e: City) -> Self {
        Entity::City(e)
    }
}

impl From<User> for Entity {
    fn from(e: User) -> Self {
        Entity::User(e)
    }
}

impl From<Amenity> for Entity {
    fn from(e: Amenity) -> Self {
        Entity::Amenity(e)
    }
}

impl From<Place> for Entity {
    fn from(e: Place) -> Self {
        Entity::Place(e)
    }
}

impl From<Review> for Entity {
    fn from(e: Review) -> Self {
        Entity::Review(e)
    }
}

/// Why a field update was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdateError {
    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("field `{0}` cannot be updated")]
    ImmutableField(String),

    #[error("field `{0}` has the wrong type")]
    WrongType(String),

    #[error("unknown entity kind `{0}`")]
    UnknownKind(String),
}

pub(crate) fn string_field(key: &str, value: &Value) -> Result<String, UpdateError> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| UpdateError::WrongType(key.to_string()))
}

pub(crate) fn opt_string_field(key: &str, value: &Value) -> Result<Option<String>, UpdateError> {
    if value.is_null() {
        return Ok(None);
    }
    string_field(key, value).map(Some)
}

pub(crate) fn int_field(key: &str, value: &Value) -> Result<i64, UpdateError> {
    value
        .as_i64()
        .ok_or_else(|| UpdateError::WrongType(key.to_string()))
}

pub(crate) fn opt_float_field(key: &str, value: &Value) -> Result<Option<f64>, UpdateError> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_f64()
        .map(Some)
        .ok_or_else(|| UpdateError::WrongType(key.to_string()))
}
