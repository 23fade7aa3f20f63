use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::{User, UserPatch, UserRow};
use crate::db::store::UserStore;
use crate::error::DatabaseError;

const USER_COLUMNS: &str = "id, phone_number, profile, created_at, updated_at";

/// Postgres-backed [`UserStore`].
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn insert(&self, phone_number: &str) -> Result<User, DatabaseError> {
        let user = User::new(phone_number.to_string());

        // The unique index on phone_number turns a lost race into Duplicate.
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, phone_number, profile, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.phone_number)
        .bind(Json(&user.profile))
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        debug!("Inserted user {}", row.id);
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE phone_number = $1",
            USER_COLUMNS
        ))
        .bind(phone_number)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(User::from))
    }

    async fn update_by_id(&self, id: Uuid, patch: &UserPatch) -> Result<Option<User>, DatabaseError> {
        // jsonb `||` is a shallow merge, matching UserPatch::apply.
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET profile = profile || $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(Json(&patch.0))
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(User::from))
    }
}
