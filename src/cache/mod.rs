//! Cache layer
//!
//! In-process cache (moka) for public listings: hero images, team members,
//! published partners and researcher profiles. Values are stored as JSON so
//! any serializable listing can share one cache. Keys are namespaced
//! `<aggregate>:<variant>` and a write to an aggregate drops every key under
//! its prefix.
//!
//! ```rust,ignore
//! use medconsult::cache::{create_cache, keys};
//! use medconsult::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set(keys::HERO_IMAGES_ACTIVE, &images).await;
//! cache.invalidate_prefix(keys::HERO_IMAGES).await;
//! ```

use anyhow::{Context, Result};
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

/// Cache key prefixes and full keys
pub mod keys {
    pub const HERO_IMAGES: &str = "hero_images:";
    pub const HERO_IMAGES_ACTIVE: &str = "hero_images:active";

    pub const TEAM_MEMBERS: &str = "team_members:";
    pub const TEAM_MEMBERS_ACTIVE: &str = "team_members:active";

    pub const PARTNERS: &str = "partners:";
    pub const PARTNERS_PUBLISHED: &str = "partners:published";

    pub const RESEARCHERS: &str = "researchers:";
    pub const RESEARCHERS_PUBLIC: &str = "researchers:public";
}

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// In-memory cache using moka
///
/// A miss and an undecodable entry look the same to callers; the entry is
/// dropped and the caller reloads from the database.
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.cache.get(key).await?;
        match entry.deserialize() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Dropping undecodable cache entry {}: {}", key, e);
                self.cache.invalidate(key).await;
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        match CacheEntry::new(value) {
            Ok(entry) => self.cache.insert(key.to_string(), entry).await,
            Err(e) => tracing::warn!("Not caching {}: {}", key, e),
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Drop every key starting with `prefix`
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key).await;
        }
        tracing::debug!("Invalidated cache prefix {}", prefix);
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

pub type SharedCache = Arc<MemoryCache>;

pub fn create_cache(config: &CacheConfig) -> SharedCache {
    Arc::new(MemoryCache::new(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = create_cache(&CacheConfig::default());
        cache.set("key1", &vec![1, 2, 3]).await;

        let result: Option<Vec<i32>> = cache.get("key1").await;
        assert_eq!(result, Some(vec![1, 2, 3]));
        assert_eq!(cache.get::<Vec<i32>>("missing").await, None);
    }

    #[tokio::test]
    async fn test_wrong_type_is_a_miss() {
        let cache = create_cache(&CacheConfig::default());
        cache.set("key", &"text").await;

        assert_eq!(cache.get::<Vec<i32>>("key").await, None);
        assert_eq!(cache.get::<String>("key").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_prefix_only_touches_prefix() {
        let cache = create_cache(&CacheConfig::default());
        cache.set(keys::HERO_IMAGES_ACTIVE, &1).await;
        cache.set("hero_images:all", &2).await;
        cache.set(keys::TEAM_MEMBERS_ACTIVE, &3).await;

        cache.invalidate_prefix(keys::HERO_IMAGES).await;

        assert_eq!(cache.get::<i32>(keys::HERO_IMAGES_ACTIVE).await, None);
        assert_eq!(cache.get::<i32>("hero_images:all").await, None);
        assert_eq!(cache.get::<i32>(keys::TEAM_MEMBERS_ACTIVE).await, Some(3));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = create_cache(&CacheConfig::default());
        cache.set("a", &1).await;
        cache.set("b", &2).await;

        cache.clear().await;
        assert_eq!(cache.entry_count().await, 0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(10))]

            #[test]
            fn entries_expire_after_ttl(key in "[a-z]{1,10}", value in "[a-z]{1,50}") {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let cache = MemoryCache::new(100, Duration::from_millis(10));
                    cache.set(&key, &value).await;
                    prop_assert_eq!(cache.get::<String>(&key).await, Some(value.clone()));

                    tokio::time::sleep(Duration::from_millis(50)).await;
                    cache.cache.run_pending_tasks().await;
                    prop_assert_eq!(cache.get::<String>(&key).await, None);
                    Ok(())
                })?;
            }
        }
    }
}
