use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::errors::ProfileResult;
use crate::model::UserProfileSnapshot;
use crate::policy::ProfileConfig;
use crate::source::{HttpProfileSource, ProfileSource};
use crate::store::{FileStore, ProfileStore};

/// Read-through replica of the remote profile.
///
/// A snapshot younger than the freshness window is served without touching
/// the network. A failed refresh serves the last good snapshot, whatever its
/// age.
pub struct ProfileCache {
    config: ProfileConfig,
    store: Arc<dyn ProfileStore>,
    source: Arc<dyn ProfileSource>,
    current: RwLock<Option<Arc<UserProfileSnapshot>>>,
}

impl ProfileCache {
    pub fn new(
        config: ProfileConfig,
        store: Arc<dyn ProfileStore>,
        source: Arc<dyn ProfileSource>,
    ) -> Self {
        Self {
            config,
            store,
            source,
            current: RwLock::new(None),
        }
    }

    /// File-backed store and HTTP source, both taken from `config`.
    pub fn from_config(config: ProfileConfig) -> ProfileResult<Self> {
        let store = Arc::new(FileStore::new(config.resolved_cache_path()));
        let source = Arc::new(HttpProfileSource::new(&config)?);
        Ok(Self::new(config, store, source))
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    pub fn is_fresh(&self, snapshot: &UserProfileSnapshot, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(snapshot.last_synced_at) < self.config.freshness_window()
    }

    /// Last known snapshot of any age: memory first, then the store.
    pub async fn cached(&self) -> ProfileResult<Option<Arc<UserProfileSnapshot>>> {
        let current = self.current.read().clone();
        if current.is_some() {
            return Ok(current);
        }
        let loaded = self.store.load().await?.map(Arc::new);
        if let Some(snapshot) = &loaded {
            *self.current.write() = Some(Arc::clone(snapshot));
        }
        Ok(loaded)
    }

    /// Fresh snapshot if one is cached. Never touches the network.
    pub async fn get(&self) -> ProfileResult<Option<Arc<UserProfileSnapshot>>> {
        let now = Utc::now();
        Ok(self
            .cached()
            .await?
            .filter(|snapshot| self.is_fresh(snapshot, now)))
    }

    #[instrument(skip(self))]
    pub async fn ensure_fresh(&self, force: bool) -> ProfileResult<Arc<UserProfileSnapshot>> {
        if !force {
            if let Some(snapshot) = self.get().await? {
                debug!(synced = %snapshot.last_synced_at, "serving cached profile");
                return Ok(snapshot);
            }
        }

        match self.refresh().await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                warn!(error = %err, retryable = err.is_retryable(), "profile refresh failed");
                match self.cached().await? {
                    Some(snapshot) => {
                        warn!(synced = %snapshot.last_synced_at, "serving last good profile");
                        Ok(snapshot)
                    }
                    None => Err(err),
                }
            }
        }
    }

    async fn refresh(&self) -> ProfileResult<Arc<UserProfileSnapshot>> {
        let raw = self.source.fetch().await?;
        self.install(&raw).await
    }

    /// Normalize and persist a raw payload. Derived structures are carried
    /// over from the previous snapshot when the content hash is unchanged.
    pub async fn install(&self, raw: &Value) -> ProfileResult<Arc<UserProfileSnapshot>> {
        let now = Utc::now();
        let mut snapshot = UserProfileSnapshot::normalize(raw, now)?;
        let previous = self.cached().await?;
        let reused = previous
            .as_deref()
            .is_some_and(|prev| snapshot.adopt_derived(prev));
        if !reused {
            snapshot.derive(now);
        }
        self.store.save(&snapshot).await?;

        info!(
            hash = snapshot.content_hash.get(..12).unwrap_or_default(),
            reused,
            skills = snapshot.skills.len(),
            experience = snapshot.work_experience.len(),
            "profile cached"
        );
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub async fn invalidate(&self) -> ProfileResult<()> {
        self.current.write().take();
        self.store.clear().await?;
        info!("profile cache invalidated");
        Ok(())
    }

    pub async fn content_hash(&self) -> ProfileResult<Option<String>> {
        Ok(self
            .cached()
            .await?
            .map(|snapshot| snapshot.content_hash.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProfileError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        payload: Mutex<Option<Value>>,
    }

    impl CountingSource {
        fn serving(payload: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                payload: Mutex::new(Some(payload)),
            })
        }

        fn go_offline(&self) {
            self.payload.lock().take();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProfileSource for CountingSource {
        async fn fetch(&self) -> ProfileResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payload
                .lock()
                .clone()
                .ok_or_else(|| ProfileError::Transport("connection refused".into()))
        }
    }

    fn cache(store: Arc<MemoryStore>, source: Arc<CountingSource>) -> ProfileCache {
        ProfileCache::new(ProfileConfig::default(), store, source)
    }

    fn aged(raw: Value, hours: i64) -> UserProfileSnapshot {
        let mut snapshot = UserProfileSnapshot::from_raw(&raw, Utc::now()).unwrap();
        snapshot.last_synced_at = Utc::now() - chrono::Duration::hours(hours);
        snapshot
    }

    #[tokio::test]
    async fn fresh_snapshots_skip_the_network() {
        let source = CountingSource::serving(json!({"email": "ada@example.com"}));
        let cache = cache(Arc::new(MemoryStore::new()), source.clone());

        assert!(cache.get().await.unwrap().is_none());
        cache.ensure_fresh(false).await.unwrap();
        cache.ensure_fresh(false).await.unwrap();
        assert_eq!(source.calls(), 1);

        cache.ensure_fresh(true).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn expired_snapshots_are_refetched_once() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(&aged(json!({"email": "old@example.com"}), 25))
            .await
            .unwrap();
        let source = CountingSource::serving(json!({"email": "new@example.com"}));
        let cache = cache(store, source.clone());

        let snapshot = cache.ensure_fresh(false).await.unwrap();
        assert_eq!(snapshot.email.as_deref(), Some("new@example.com"));
        cache.ensure_fresh(false).await.unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn failures_serve_the_last_good_snapshot() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(&aged(json!({"email": "old@example.com"}), 48))
            .await
            .unwrap();
        let source = CountingSource::serving(json!({}));
        source.go_offline();
        let cache = cache(store, source.clone());

        let snapshot = cache.ensure_fresh(false).await.unwrap();
        assert_eq!(snapshot.email.as_deref(), Some("old@example.com"));
        assert!(cache.get().await.unwrap().is_none());

        cache.invalidate().await.unwrap();
        let err = cache.ensure_fresh(false).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn derived_structures_follow_the_content_hash() {
        let store = Arc::new(MemoryStore::new());
        let mut seeded = aged(json!({"email": "a@example.com", "skills": ["Rust"]}), 1);
        seeded.keyword_index = vec!["seeded".into()];
        store.save(&seeded).await.unwrap();
        let cache = cache(store, CountingSource::serving(json!({})));

        let same = cache
            .install(&json!({"email": "b@example.com", "skills": ["Rust"]}))
            .await
            .unwrap();
        assert_eq!(same.keyword_index, vec!["seeded"]);
        assert_eq!(same.email.as_deref(), Some("b@example.com"));

        let changed = cache
            .install(&json!({"email": "b@example.com", "skills": ["Rust", "Go"]}))
            .await
            .unwrap();
        assert_eq!(changed.keyword_index, vec!["go", "rust"]);
        assert_ne!(changed.content_hash, same.content_hash);
    }
}
