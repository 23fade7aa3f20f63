use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// Keys owned by the store that a profile update may not touch.
const RESERVED_FIELDS: &[&str] = &["id", "phone_number", "created_at", "updated_at"];
const MAX_PATCH_FIELDS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub phone_number: String,
    #[serde(default)]
    pub profile: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A freshly signed-up user: phone number only, empty profile.
    pub fn new(phone_number: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phone_number,
            profile: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub phone_number: String,
    pub profile: Json<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            phone_number: row.phone_number,
            profile: row.profile.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Partial profile update, shallow-merged into `User::profile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserPatch(pub Map<String, Value>);

impl UserPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.0.is_empty() {
            return Err(AppError::ValidationError("update payload is empty".into()));
        }
        if self.0.len() > MAX_PATCH_FIELDS {
            return Err(AppError::ValidationError(format!(
                "update payload has more than {} fields",
                MAX_PATCH_FIELDS
            )));
        }
        if let Some(key) = self.0.keys().find(|k| RESERVED_FIELDS.contains(&k.as_str())) {
            return Err(AppError::ValidationError(format!("field `{}` cannot be updated", key)));
        }
        Ok(())
    }

    pub fn apply(&self, user: &mut User) {
        for (key, value) in &self.0 {
            user.profile.insert(key.clone(), value.clone());
        }
        user.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: Value) -> UserPatch {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_new_user_has_empty_profile() {
        let user = User::new("+15551234567".to_string());
        assert_eq!(user.phone_number, "+15551234567");
        assert!(user.profile.is_empty());
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_patch_validation() {
        assert!(patch(json!({"display_name": "Ada"})).validate().is_ok());
        assert!(matches!(patch(json!({})).validate(), Err(AppError::ValidationError(_))));
        assert!(matches!(
            patch(json!({"phone_number": "+15550000000"})).validate(),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(patch(json!({"id": "x"})).validate(), Err(AppError::ValidationError(_))));

        let oversized: Map<String, Value> = (0..=MAX_PATCH_FIELDS)
            .map(|i| (format!("field_{}", i), json!(i)))
            .collect();
        assert!(UserPatch(oversized).validate().is_err());
    }

    #[test]
    fn test_patch_merges_into_profile() {
        let mut user = User::new("+15551234567".to_string());
        user.profile.insert("city".into(), json!("Oslo"));

        patch(json!({"display_name": "Ada", "city": "Bergen"})).apply(&mut user);

        assert_eq!(user.profile["display_name"], json!("Ada"));
        assert_eq!(user.profile["city"], json!("Bergen"));
        assert!(user.updated_at >= user.created_at);
    }

    #[test]
    fn test_patch_rejects_non_object_payload() {
        let result: Result<UserPatch, _> = serde_json::from_value(json!(["not", "an", "object"]));
        assert!(result.is_err());
    }
}
