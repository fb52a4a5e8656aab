//! Review records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::entity::{string_field, UpdateError};

/// A user's review of a place. Both foreign keys are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub text: String,
    pub place_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        text: impl Into<String>,
        place_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            place_id: place_id.into(),
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn apply_update(&mut self, patch: &Map<String, Value>) -> Result<(), UpdateError> {
        for (key, value) in patch {
            match key.as_str() {
                "text" => self.text = string_field(key, value)?,
                "id" | "kind" | "place_id" | "user_id" | "created_at" | "updated_at" => {
                    return Err(UpdateError::ImmutableField(key.clone()))
                }
                _ => return Err(UpdateError::UnknownField(key.clone())),
            }
        }
        Ok(())
    }
}
