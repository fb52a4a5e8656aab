//! Place records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::entity::{int_field, opt_float_field, opt_string_field, string_field, UpdateError};

/// A rentable place. Belongs to a city and an owning user, owns reviews,
/// and links many-to-many to amenities.
///
/// `amenity_ids` is the link edge in insertion order. The file backend stores
/// it directly; the relational backend derives it from the join table when a
/// place is materialized. Mutations go through the engine's link/unlink
/// operations, never through field updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub city_id: String,
    pub user_id: String,
    pub number_rooms: i64,
    pub number_bathrooms: i64,
    pub max_guest: i64,
    pub price_by_night: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub amenity_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Place {
    pub fn new(
        name: impl Into<String>,
        city_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            city_id: city_id.into(),
            user_id: user_id.into(),
            number_rooms: 0,
            number_bathrooms: 0,
            max_guest: 0,
            price_by_night: 0,
            latitude: None,
            longitude: None,
            amenity_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn apply_update(&mut self, patch: &Map<String, Value>) -> Result<(), UpdateError> {
        for (key, value) in patch {
            match key.as_str() {
                "name" => self.name = string_field(key, value)?,
                "description" => self.description = opt_string_field(key, value)?,
                "number_rooms" => self.number_rooms = int_field(key, value)?,
                "number_bathrooms" => self.number_bathrooms = int_field(key, value)?,
                "max_guest" => self.max_guest = int_field(key, value)?,
                "price_by_night" => self.price_by_night = int_field(key, value)?,
                "latitude" => self.latitude = opt_float_field(key, value)?,
                "longitude" => self.longitude = opt_float_field(key, value)?,
                "id" | "kind" | "city_id" | "user_id" | "amenity_ids" | "created_at"
                | "updated_at" => return Err(UpdateError::ImmutableField(key.clone())),
                _ => return Err(UpdateError::UnknownField(key.clone())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_fields_update_through_the_allow_list() {
        let mut place = Place::new("Loft", "city-1", "user-1");
        let mut patch = Map::new();
        patch.insert("number_rooms".into(), Value::from(3));
        patch.insert("price_by_night".into(), Value::from(120));
        patch.insert("latitude".into(), Value::from(37.77));
        place.apply_update(&patch).unwrap();
        assert_eq!(place.number_rooms, 3);
        assert_eq!(place.price_by_night, 120);
        assert_eq!(place.latitude, Some(37.77));
    }

    #[test]
    fn link_edges_are_not_updatable_as_fields() {
        let mut place = Place::new("Loft", "city-1", "user-1");
        let mut patch = Map::new();
        patch.insert("amenity_ids".into(), Value::from(vec!["a-1"]));
        assert_eq!(
            place.apply_update(&patch),
            Err(UpdateError::ImmutableField("amenity_ids".into()))
        );
    }
}
