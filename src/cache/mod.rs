//! Cache module
//!
//! TTL key-value caches (in-process or Redis) and the dual-key user cache
//! built on them.

mod redis_store;
mod store;
mod user_cache;

pub use redis_store::RedisCache;
pub use store::{CacheStore, MemoryCache};
#[cfg(test)]
pub use store::MockCacheStore;
pub use user_cache::{id_key, phone_key, UserCache};

use std::sync::Arc;
use tracing::info;

use crate::config::CacheConfig;
use crate::error::CacheError;

/// Redis when `cache.url` is set, otherwise a process-local cache.
pub async fn connect(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => Ok(Arc::new(RedisCache::connect(url).await?)),
        None => {
            info!("No cache.url configured, using in-process cache");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(url: Option<&str>) -> CacheConfig {
        CacheConfig {
            ttl_seconds: 60,
            url: url.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_connect_without_url_uses_memory() {
        for url in [None, Some("")] {
            let cache = connect(&config(url)).await.unwrap();
            cache.set("k", "v".to_string(), Duration::from_secs(60)).await.unwrap();
            assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        }
    }

    #[tokio::test]
    async fn test_connect_with_bad_url_fails() {
        let result = connect(&config(Some("http://not-redis"))).await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }
}
