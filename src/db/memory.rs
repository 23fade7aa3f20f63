use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{User, UserPatch};
use crate::db::store::UserStore;
use crate::error::DatabaseError;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    // unique index
    by_phone: HashMap<String, Uuid>,
}

/// In-process [`UserStore`] with the same uniqueness guarantee as the
/// Postgres schema. Used for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, phone_number: &str) -> Result<User, DatabaseError> {
        // Check and insert under one write guard.
        let mut tables = self.tables.write().await;
        if tables.by_phone.contains_key(phone_number) {
            return Err(DatabaseError::Duplicate);
        }

        let user = User::new(phone_number.to_string());
        tables.by_phone.insert(user.phone_number.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_phone
            .get(phone_number)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn update_by_id(&self, id: Uuid, patch: &UserPatch) -> Result<Option<User>, DatabaseError> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            patch.apply(user);
            user.clone()
        }))
    }
}
