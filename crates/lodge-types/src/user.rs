//! User accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::entity::{opt_string_field, string_field, UpdateError};

/// A registered user. Owns places and reviews.
///
/// The password is digested before it ever reaches this struct; the cleartext
/// is not stored anywhere, and `password_digest` is stripped from wire
/// representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub password_digest: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, password: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            password_digest: digest_password(password),
            first_name: None,
            last_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn apply_update(&mut self, patch: &Map<String, Value>) -> Result<(), UpdateError> {
        for (key, value) in patch {
            match key.as_str() {
                "email" => self.email = string_field(key, value)?,
                "password" => self.password_digest = digest_password(&string_field(key, value)?),
                "first_name" => self.first_name = opt_string_field(key, value)?,
                "last_name" => self.last_name = opt_string_field(key, value)?,
                "id" | "kind" | "password_digest" | "created_at" | "updated_at" => {
                    return Err(UpdateError::ImmutableField(key.clone()))
                }
                _ => return Err(UpdateError::UnknownField(key.clone())),
            }
        }
        Ok(())
    }
}

/// One-way password digest: SHA-256, hex encoded.
///
/// Stable (same input, same output) so equality checks against the stored
/// digest work without keeping the cleartext anywhere.
pub fn digest_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
