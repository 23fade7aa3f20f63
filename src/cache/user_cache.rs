use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::store::CacheStore;
use crate::db::models::User;
use crate::error::CacheError;

pub fn id_key(id: Uuid) -> String {
    format!("user:id:{}", id)
}

pub fn phone_key(phone_number: &str) -> String {
    format!("user:phone:{}", phone_number)
}

/// Typed user cache over a [`CacheStore`].
///
/// The snapshot lives only under `user:id:<id>`; `user:phone:<phone>` holds
/// the id. Dropping the id entry therefore invalidates both lookups.
///
/// Every backend failure is logged and reported as a miss: the cache can
/// make lookups faster but never makes them fail.
#[derive(Clone)]
pub struct UserCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl UserCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Option<User> {
        let key = id_key(id);
        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    self.delete_quietly(&key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn get_by_phone(&self, phone_number: &str) -> Option<User> {
        let key = phone_key(phone_number);
        let id = match self.store.get(&key).await {
            Ok(Some(raw)) => match Uuid::parse_str(&raw) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Discarding malformed cache reference {}: {}", key, e);
                    self.delete_quietly(&key).await;
                    return None;
                }
            },
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        // A dangling reference just means the snapshot expired or was
        // invalidated; the caller falls back to the store.
        self.get_by_id(id)
            .await
            .filter(|user| user.phone_number == phone_number)
    }

    /// Caches a record just read from the store after a miss.
    ///
    /// The snapshot is only written if no live one exists: a writer that
    /// cached a newer record while the read was in flight keeps its entry.
    pub async fn fill(&self, user: &User) {
        if let Err(e) = self.try_write(user, false).await {
            warn!("Failed to cache user {}: {}", user.id, e);
        }
    }

    /// Caches a record the store just wrote, replacing any older snapshot.
    /// If that fails both keys are dropped instead, so no older snapshot
    /// outlives the write.
    pub async fn put(&self, user: &User) {
        if let Err(e) = self.try_write(user, true).await {
            warn!("Failed to cache user {}, invalidating: {}", user.id, e);
            self.invalidate(user).await;
        }
    }

    // Snapshot first, then the phone reference to it. The reference never
    // changes for a given user, so it is always overwritten.
    async fn try_write(&self, user: &User, overwrite: bool) -> Result<(), CacheError> {
        let snapshot = serde_json::to_string(user)?;
        let key = id_key(user.id);
        if overwrite {
            self.store.set(&key, snapshot, self.ttl).await?;
        } else if !self.store.set_if_absent(&key, snapshot, self.ttl).await? {
            debug!("Kept existing cache entry for user {}", user.id);
        }
        self.store
            .set(&phone_key(&user.phone_number), user.id.to_string(), self.ttl)
            .await?;
        debug!("Cached user {}", user.id);
        Ok(())
    }

    /// Removes both keys for `user`. Failures are logged; the TTL bounds how
    /// long a stale entry can survive one.
    pub async fn invalidate(&self, user: &User) {
        self.delete_quietly(&id_key(user.id)).await;
        self.delete_quietly(&phone_key(&user.phone_number)).await;
    }

    async fn delete_quietly(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!("Cache delete failed for {}: {}", key, e);
        }
    }
}
