use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cache key made of path-like segments, e.g. `["/api/posts", "42"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

struct CacheEntry {
    value: Value,
    fetched_at: Instant,
}

/// Response cache keyed by `QueryKey`. Entries never expire on their own;
/// readers pass the staleness window they accept.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<DashMap<QueryKey, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value if it was fetched less than `stale_time` ago.
    pub fn get_fresh(&self, key: &QueryKey, stale_time: Duration) -> Option<Value> {
        self.entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < stale_time)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: QueryKey, value: Value) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drops every entry whose key starts with `prefix`.
    pub fn invalidate(&self, prefix: &QueryKey) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn entry_goes_stale_after_window() {
        let cache = QueryCache::new();
        let key = QueryKey::new(["/api/posts"]);
        cache.insert(key.clone(), json!([1, 2]));

        assert_eq!(
            cache.get_fresh(&key, Duration::from_secs(30)),
            Some(json!([1, 2]))
        );

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get_fresh(&key, Duration::from_secs(30)), None);
        assert_eq!(
            cache.get_fresh(&key, Duration::from_secs(60)),
            Some(json!([1, 2]))
        );
    }

    #[test]
    fn invalidate_drops_prefix_matches_only() {
        let cache = QueryCache::new();
        cache.insert(QueryKey::new(["/api/posts"]), json!([]));
        cache.insert(QueryKey::new(["/api/posts", "7"]), json!({}));
        cache.insert(QueryKey::new(["/api/stories"]), json!([]));
        cache.insert(QueryKey::new(["/api/postsearch"]), json!([]));

        cache.invalidate(&QueryKey::new(["/api/posts"]));

        assert_eq!(cache.len(), 2);
        let fresh = Duration::from_secs(60);
        assert!(cache.get_fresh(&QueryKey::new(["/api/stories"]), fresh).is_some());
        assert!(cache.get_fresh(&QueryKey::new(["/api/postsearch"]), fresh).is_some());
        assert!(cache.get_fresh(&QueryKey::new(["/api/posts", "7"]), fresh).is_none());
    }

    #[test]
    fn segment_prefix_is_not_string_prefix() {
        let key = QueryKey::new(["/api/users", "ada", "posts"]);
        assert!(key.starts_with(&QueryKey::new(["/api/users"])));
        assert!(key.starts_with(&QueryKey::new(["/api/users", "ada"])));
        assert!(!key.starts_with(&QueryKey::new(["/api/user"])));
    }
}
