use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::geo::GeofenceConfig;
use crate::store::{GeofenceStore, StoreResult};

const ACTIVE: &str = "active";

/// Read-through cache of the active geofence, read on every admission.
/// Saves write through, so the cache holds the new fence as soon as it is stored.
pub struct GeofenceCache {
    store: Arc<dyn GeofenceStore>,
    cache: Cache<&'static str, GeofenceConfig>,
    fallback: GeofenceConfig,
}

impl GeofenceCache {
    pub fn new(store: Arc<dyn GeofenceStore>, fallback: GeofenceConfig, ttl: Duration) -> Self {
        Self {
            store,
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(ttl)
                .build(),
            fallback,
        }
    }

    /// Stored config, or the configured default when none has been saved yet.
    pub async fn get(&self) -> StoreResult<GeofenceConfig> {
        if let Some(config) = self.cache.get(ACTIVE).await {
            return Ok(config);
        }

        let config = self.store.load_geofence().await?.unwrap_or(self.fallback);
        self.cache.insert(ACTIVE, config).await;
        Ok(config)
    }

    pub async fn replace(&self, config: GeofenceConfig) -> StoreResult<()> {
        self.store.save_geofence(&config).await?;
        self.cache.insert(ACTIVE, config).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoads {
        inner: MemoryStore,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl GeofenceStore for CountingLoads {
        async fn load_geofence(&self) -> StoreResult<Option<GeofenceConfig>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_geofence().await
        }

        async fn save_geofence(&self, config: &GeofenceConfig) -> StoreResult<()> {
            self.inner.save_geofence(config).await
        }
    }

    fn fence(lat: f64, radius: f64) -> GeofenceConfig {
        GeofenceConfig::new(GeoPoint::new(lat, 0.0).unwrap(), radius).unwrap()
    }

    #[actix_web::test]
    async fn test_falls_back_to_default() {
        let cache = GeofenceCache::new(
            Arc::new(MemoryStore::new()),
            fence(1.0, 100.0),
            Duration::from_secs(60),
        );
        assert_eq!(cache.get().await.unwrap(), fence(1.0, 100.0));
    }

    #[actix_web::test]
    async fn test_replace_writes_through() {
        let store = Arc::new(MemoryStore::with_geofence(fence(2.0, 50.0)));
        let cache = GeofenceCache::new(store.clone(), fence(1.0, 100.0), Duration::from_secs(60));

        assert_eq!(cache.get().await.unwrap(), fence(2.0, 50.0));

        cache.replace(fence(3.0, 75.0)).await.unwrap();
        assert_eq!(cache.get().await.unwrap(), fence(3.0, 75.0));
        assert_eq!(store.load_geofence().await.unwrap(), Some(fence(3.0, 75.0)));
    }

    #[actix_web::test]
    async fn test_read_after_replace_skips_store() {
        let store = Arc::new(CountingLoads {
            inner: MemoryStore::with_geofence(fence(2.0, 50.0)),
            loads: AtomicUsize::new(0),
        });
        let cache = GeofenceCache::new(store.clone(), fence(1.0, 100.0), Duration::from_secs(60));

        assert_eq!(cache.get().await.unwrap(), fence(2.0, 50.0));
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        cache.replace(fence(3.0, 75.0)).await.unwrap();
        assert_eq!(cache.get().await.unwrap(), fence(3.0, 75.0));
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }
}
