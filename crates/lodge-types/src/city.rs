//! City records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::entity::{string_field, UpdateError};

/// A city inside a state. `state_id` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    pub state_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl City {
    pub fn new(name: impl Into<String>, state_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            state_id: state_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn apply_update(&mut self, patch: &Map<String, Value>) -> Result<(), UpdateError> {
        for (key, value) in patch {
            match key.as_str() {
                "name" => self.name = string_field(key, value)?,
                "id" | "kind" | "state_id" | "created_at" | "updated_at" => {
                    return Err(UpdateError::ImmutableField(key.clone()))
                }
                _ => return Err(UpdateError::UnknownField(key.clone())),
            }
        }
        Ok(())
    }
}
