use chrono::{serde::ts_milliseconds, DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

use crate::error::{LeaderboardError, LeaderboardResult};
use crate::feed::client::PostsSource;
use crate::feed::models::Post;
use crate::storage::Storage;

pub const CACHE_KEY: &str = "shomato_posts_cache";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Persisted form of the cache. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub posts: Vec<Post>,
    // Last merge
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    // Last successful fetch
    #[serde(with = "ts_milliseconds")]
    pub last_fetch: DateTime<Utc>,
}

/// Keeps the existing version of a post unless the incoming one carries
/// strictly more seeds. Only the sums are compared.
pub fn merge(existing: Option<Post>, incoming: Post) -> Post {
    match existing {
        Some(existing) if incoming.total_seeds() <= existing.total_seeds() => existing,
        _ => incoming,
    }
}

/// Union of both collections keyed by post id. Existing posts keep their
/// position and new ones are appended in incoming order. Repeated ids, on
/// either side, go through `merge`.
pub fn merge_posts(existing: Vec<Post>, incoming: Vec<Post>) -> Vec<Post> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(existing.len());
    let mut merged: Vec<Post> = Vec::with_capacity(existing.len() + incoming.len());

    for post in existing.into_iter().chain(incoming) {
        match positions.get(&post.post_id) {
            Some(&idx) => {
                let current = std::mem::take(&mut merged[idx]);
                merged[idx] = merge(Some(current), post);
            }
            None => {
                positions.insert(post.post_id.clone(), merged.len());
                merged.push(merge(None, post));
            }
        }
    }

    merged
}

type SharedRecord = Arc<Mutex<Option<CacheRecord>>>;

/// In-memory posts cache mirrored to durable storage.
///
/// Clones share the same record. Storage failures are logged and never
/// surfaced: the cache then simply behaves as memory-only.
#[derive(Clone)]
pub struct PostsCache {
    record: SharedRecord,
    // Held from the record update until its write completes, so writes land in update order
    persist: Arc<Mutex<()>>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    cache_duration: Duration,
}

impl PostsCache {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>, cache_duration: Duration) -> Self {
        let record = Self::load_from_storage(storage.as_ref());
        PostsCache {
            record: Arc::new(Mutex::new(record)),
            persist: Arc::new(Mutex::new(())),
            storage,
            clock,
            cache_duration,
        }
    }

    fn load_from_storage(storage: &dyn Storage) -> Option<CacheRecord> {
        let raw = match storage.get(CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to load cache from storage: {e}");
                return None;
            }
        };

        match serde_json::from_str::<CacheRecord>(&raw) {
            Ok(record) => {
                info!("Loaded {} cached posts from storage.", record.posts.len());
                Some(record)
            }
            Err(e) => {
                warn!("Ignoring unreadable cache entry: {e}");
                None
            }
        }
    }

    fn save_to_storage(&self, record: &CacheRecord) {
        let saved = serde_json::to_string(record)
            .map_err(LeaderboardError::from)
            .and_then(|raw| self.storage.set(CACHE_KEY, &raw));
        if let Err(e) = saved {
            error!("Failed to save cache to storage: {e}");
        }
    }

    // No holder ever leaves the record half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Option<CacheRecord>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when nothing is cached or the last fetch is older than the cache duration.
    pub fn should_fetch(&self) -> bool {
        match self.lock().as_ref() {
            None => true,
            Some(record) => self.clock.now() - record.last_fetch > self.cache_duration,
        }
    }

    pub fn get(&self) -> Option<Vec<Post>> {
        self.lock().as_ref().map(|record| record.posts.clone())
    }

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.lock().as_ref().map(|record| record.last_fetch)
    }

    /// Merges `posts` into the cache and persists the result.
    pub fn set(&self, posts: Vec<Post>) {
        let now = self.clock.now();
        let mut record = self.lock();

        let existing = record
            .as_ref()
            .map(|r| r.posts.clone())
            .unwrap_or_default();
        let merged = CacheRecord {
            posts: merge_posts(existing, posts),
            timestamp: now,
            last_fetch: now,
        };
        debug!("Cache now holds {} posts.", merged.posts.len());
        *record = Some(merged.clone());

        let _persist = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        drop(record);
        self.save_to_storage(&merged);
    }

    pub fn clear(&self) {
        let mut record = self.lock();
        *record = None;

        let _persist = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        drop(record);
        if let Err(e) = self.storage.remove(CACHE_KEY) {
            error!("Failed to remove cache from storage: {e}");
        }
    }

    /// Foreground load: fresh cache hits skip the network; failed fetches
    /// fall back to whatever is cached, stale or not.
    pub async fn fetch_posts(&self, source: &dyn PostsSource) -> LeaderboardResult<Vec<Post>> {
        let cached = self.get();

        if let Some(posts) = &cached {
            if !self.should_fetch() {
                return Ok(posts.clone());
            }
        }

        match source.fetch_posts().await {
            Ok(posts) => {
                self.set(posts);
                Ok(self.get().unwrap_or_default())
            }
            Err(e) => {
                error!("Failed to fetch posts: {e}");
                match cached {
                    Some(posts) => Ok(posts),
                    None => Err(e),
                }
            }
        }
    }

    /// One background refresh. Failures leave the current cache authoritative.
    pub async fn background_update(&self, source: &dyn PostsSource) {
        match source.fetch_posts().await {
            Ok(posts) => {
                info!("Background update fetched {} posts.", posts.len());
                self.set(posts);
            }
            Err(e) => warn!("Background fetch failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::{post, FailingStorage, ManualClock, Reply, StubSource};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cache_with(storage: MemoryStorage, clock: Arc<ManualClock>) -> PostsCache {
        PostsCache::new(Arc::new(storage), clock, Duration::minutes(10))
    }

    fn scores(cache: &PostsCache) -> Vec<(String, i64)> {
        cache
            .get()
            .unwrap_or_default()
            .iter()
            .map(|p| (p.post_id.clone(), p.total_seeds()))
            .collect()
    }

    #[test]
    fn merge_keeps_strictly_larger_totals_only() {
        let old = post("p1", "u1", "G", &[5, 3]);

        assert_eq!(merge(None, old.clone()), old);
        assert_eq!(merge(Some(old.clone()), post("p1", "u1", "G", &[5])), old);
        // Equal sums keep the existing version.
        assert_eq!(merge(Some(old.clone()), post("p1", "u1", "other", &[8])), old);
        assert_eq!(
            merge(Some(old), post("p1", "u1", "G", &[9])).total_seeds(),
            9
        );
    }

    #[test]
    fn merge_compares_sums_not_lengths() {
        let existing = post("p1", "u1", "G", &[4]);
        let incoming = post("p1", "u1", "G", &[10, -7]);
        assert_eq!(merge(Some(existing.clone()), incoming), existing);
    }

    #[test]
    fn merge_posts_is_a_union_preserving_order() {
        let existing = vec![post("a", "u1", "G", &[1]), post("b", "u2", "H", &[2])];
        let incoming = vec![post("c", "u3", "I", &[3]), post("a", "u1", "G", &[7])];

        let ids: Vec<(String, i64)> = merge_posts(existing, incoming)
            .iter()
            .map(|p| (p.post_id.clone(), p.total_seeds()))
            .collect();

        assert_eq!(
            ids,
            vec![
                ("a".to_string(), 7),
                ("b".to_string(), 2),
                ("c".to_string(), 3)
            ]
        );
    }

    #[test]
    fn merge_posts_collapses_duplicates_within_a_batch() {
        let incoming = vec![post("a", "u1", "G", &[1]), post("a", "u1", "G", &[4])];
        let merged = merge_posts(vec![], incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].total_seeds(), 4);
    }

    #[test]
    fn merging_twice_equals_merging_once() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(MemoryStorage::new(), clock);
        cache.set(vec![post("a", "u1", "G", &[3]), post("b", "u2", "H", &[1])]);

        let incoming = vec![post("a", "u1", "G", &[1]), post("c", "u3", "I", &[2])];
        cache.set(incoming.clone());
        let once = cache.get();
        cache.set(incoming);

        assert_eq!(cache.get(), once);
    }

    #[test]
    fn cached_score_never_decreases() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(MemoryStorage::new(), clock);

        let mut best: i64 = 0;
        for seeds in [vec![3], vec![8], vec![5], vec![2, 2], vec![9], vec![]] {
            best = best.max(seeds.iter().sum());
            cache.set(vec![post("p1", "u1", "G", &seeds)]);
            assert_eq!(scores(&cache), vec![("p1".to_string(), best)]);
        }
    }

    #[test]
    fn overflowing_seed_totals_keep_the_cache() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(MemoryStorage::new(), clock);
        cache.set(vec![post("p1", "u1", "G", &[5, 3])]);

        cache.set(vec![post("p1", "u1", "G", &[i64::MIN, -1])]);
        assert_eq!(scores(&cache), vec![("p1".to_string(), 8)]);

        cache.set(vec![post("p1", "u1", "G", &[i64::MAX, 1])]);
        assert_eq!(scores(&cache), vec![("p1".to_string(), i64::MAX)]);
    }

    #[test]
    fn lower_incoming_score_keeps_cached_version() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(MemoryStorage::new(), clock);
        cache.set(vec![post("p1", "u1", "G", &[5, 3])]);

        cache.set(vec![post("p1", "u1", "G", &[5])]);

        assert_eq!(scores(&cache), vec![("p1".to_string(), 8)]);
    }

    #[test]
    fn posts_missing_from_a_fetch_are_retained() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(MemoryStorage::new(), clock);
        cache.set(vec![post("a", "u1", "G", &[1]), post("b", "u2", "H", &[2])]);

        cache.set(vec![post("c", "u3", "I", &[3])]);

        assert_eq!(cache.get().unwrap().len(), 3);
    }

    #[test]
    fn staleness_follows_last_fetch() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(MemoryStorage::new(), clock.clone());
        assert!(cache.should_fetch());
        assert!(cache.get().is_none());

        cache.set(vec![]);
        assert!(!cache.should_fetch());
        assert_eq!(cache.last_fetch(), Some(clock.now()));

        clock.advance(Duration::minutes(10));
        assert!(!cache.should_fetch());

        clock.advance(Duration::milliseconds(1));
        assert!(cache.should_fetch());
    }

    #[test]
    fn set_persists_and_reloads_across_instances() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(storage.clone(), clock.clone());
        cache.set(vec![post("p1", "u1", "G", &[5, 3])]);

        let raw = storage.get(CACHE_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["lastFetch"], json!(clock.now().timestamp_millis()));
        assert_eq!(json["posts"][0]["PostID"], json!("p1"));

        let reloaded = cache_with(storage, clock);
        assert_eq!(reloaded.get(), cache.get());
        assert!(!reloaded.should_fetch());
    }

    #[test]
    fn malformed_storage_entry_starts_empty() {
        let storage = MemoryStorage::new();
        storage.set(CACHE_KEY, "{definitely not json").unwrap();

        let cache = cache_with(storage, Arc::new(ManualClock::new()));

        assert!(cache.get().is_none());
        assert!(cache.should_fetch());
    }

    #[test]
    fn duplicate_ids_in_stored_posts_keep_the_best() {
        let existing = vec![
            post("a", "u1", "G", &[9]),
            post("b", "u2", "H", &[1]),
            post("a", "u1", "G", &[2]),
        ];

        let merged = merge_posts(existing, vec![]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].total_seeds(), 9);
    }

    #[test]
    fn failing_storage_leaves_a_working_memory_cache() {
        let cache = PostsCache::new(
            Arc::new(FailingStorage),
            Arc::new(ManualClock::new()),
            Duration::minutes(10),
        );
        assert!(cache.get().is_none());
        assert!(cache.should_fetch());

        cache.set(vec![post("p1", "u1", "G", &[5, 3])]);
        assert_eq!(scores(&cache), vec![("p1".to_string(), 8)]);
        assert!(!cache.should_fetch());

        cache.clear();
        assert!(cache.get().is_none());
    }

    #[test]
    fn clear_drops_memory_and_storage() {
        let storage = MemoryStorage::new();
        let cache = cache_with(storage.clone(), Arc::new(ManualClock::new()));
        cache.set(vec![post("p1", "u1", "G", &[1])]);

        cache.clear();

        assert!(cache.get().is_none());
        assert_eq!(storage.get(CACHE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn fresh_cache_skips_the_source() {
        let cache = cache_with(MemoryStorage::new(), Arc::new(ManualClock::new()));
        cache.set(vec![post("p1", "u1", "G", &[1])]);
        let source = StubSource::posts(vec![post("p2", "u2", "H", &[2])]);

        let posts = cache.fetch_posts(&source).await.unwrap();

        assert_eq!(source.calls(), 0);
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn stale_cache_fetches_and_merges() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(MemoryStorage::new(), clock.clone());
        cache.set(vec![post("p1", "u1", "G", &[8])]);
        clock.advance(Duration::minutes(11));
        let source = StubSource::posts(vec![post("p1", "u1", "G", &[5]), post("p2", "u2", "H", &[2])]);

        let posts = cache.fetch_posts(&source).await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].total_seeds(), 8);
        assert!(!cache.should_fetch());
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_stale_cache() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(MemoryStorage::new(), clock.clone());
        cache.set(vec![post("p1", "u1", "G", &[8])]);
        clock.advance(Duration::hours(1));

        let posts = cache.fetch_posts(&StubSource::failing(503)).await.unwrap();

        assert_eq!(posts.len(), 1);
        // Nothing was fetched, so the cache is still stale.
        assert!(cache.should_fetch());
    }

    #[tokio::test]
    async fn failed_fetch_without_cache_propagates() {
        let cache = cache_with(MemoryStorage::new(), Arc::new(ManualClock::new()));

        let result = cache.fetch_posts(&StubSource::failing(503)).await;

        assert!(matches!(result, Err(LeaderboardError::UpstreamHttp(503))));
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn background_update_merges_or_keeps_previous_cache() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(MemoryStorage::new(), clock.clone());
        let source = StubSource::new(vec![
            Reply::Posts(vec![post("p1", "u1", "G", &[2])]),
            Reply::Status(500),
            Reply::Posts(vec![post("p1", "u1", "G", &[6])]),
        ]);

        cache.background_update(&source).await;
        assert_eq!(scores(&cache), vec![("p1".to_string(), 2)]);
        let first_fetch = cache.last_fetch();

        clock.advance(Duration::minutes(10));
        cache.background_update(&source).await;
        assert_eq!(scores(&cache), vec![("p1".to_string(), 2)]);
        assert_eq!(cache.last_fetch(), first_fetch);

        cache.background_update(&source).await;
        assert_eq!(scores(&cache), vec![("p1".to_string(), 6)]);
        assert_eq!(cache.last_fetch(), Some(clock.now()));
    }
}
