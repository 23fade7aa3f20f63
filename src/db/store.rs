use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{User, UserPatch};
use crate::error::DatabaseError;

/// Durable user records, keyed by id and unique by phone number.
///
/// `insert` must fail with [`DatabaseError::Duplicate`] when a user already
/// holds the phone number; the orchestrator relies on that to settle
/// concurrent first-time sign-ups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, phone_number: &str) -> Result<User, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, DatabaseError>;

    /// Returns `None` when no user has this id.
    async fn update_by_id(&self, id: Uuid, patch: &UserPatch) -> Result<Option<User>, DatabaseError>;
}
