use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::UserCache;
use crate::db::models::{User, UserPatch};
use crate::db::store::UserStore;
use crate::error::{AppError, DatabaseError};
use crate::otp::PhoneNumber;

/// How a verified phone number was resolved to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignInOutcome {
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "logged in")]
    LoggedIn,
}

/// Cache-aside access to user records.
///
/// Reads go to the cache first and fill it from the store on a miss.
/// Writes go to the store and then replace the cached snapshot before
/// returning. A fill never overwrites a live snapshot, so a slow read that
/// started before an update cannot put the older record back.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    cache: UserCache,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>, cache: UserCache) -> Self {
        Self { store, cache }
    }

    pub async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, AppError> {
        if let Some(user) = self.cache.get_by_phone(phone.as_str()).await {
            debug!("Cache hit for phone {}", phone.masked());
            return Ok(Some(user));
        }

        let user = self.store.find_by_phone(phone.as_str()).await?;
        if let Some(user) = &user {
            self.cache.fill(user).await;
        }
        Ok(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        if let Some(user) = self.cache.get_by_id(id).await {
            debug!("Cache hit for user {}", id);
            return Ok(Some(user));
        }

        let user = self.store.find_by_id(id).await?;
        if let Some(user) = &user {
            self.cache.fill(user).await;
        }
        Ok(user)
    }

    /// Resolves a verified phone number to exactly one user.
    ///
    /// The store's unique constraint decides concurrent first sign-ups: the
    /// losing insert reads back the winner's record.
    pub async fn find_or_create(&self, phone: &PhoneNumber) -> Result<(User, SignInOutcome), AppError> {
        if let Some(user) = self.find_by_phone(phone).await? {
            return Ok((user, SignInOutcome::LoggedIn));
        }

        match self.store.insert(phone.as_str()).await {
            Ok(user) => {
                info!("Created new user {} for {}", user.id, phone.masked());
                self.cache.put(&user).await;
                Ok((user, SignInOutcome::Created))
            }
            Err(DatabaseError::Duplicate) => {
                warn!("Concurrent sign-up for {}, using existing user", phone.masked());
                let user = self
                    .store
                    .find_by_phone(phone.as_str())
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError("user vanished after duplicate insert".into())
                    })?;
                self.cache.fill(&user).await;
                Ok((user, SignInOutcome::LoggedIn))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies `patch` and caches the updated record before returning.
    /// `None` means no user has this id.
    pub async fn update_by_id(&self, id: Uuid, patch: &UserPatch) -> Result<Option<User>, AppError> {
        patch.validate()?;

        let updated = self.store.update_by_id(id, patch).await?;
        if let Some(user) = &updated {
            self.cache.put(user).await;
            info!("Updated user {}", user.id);
        }
        Ok(updated)
    }
}
