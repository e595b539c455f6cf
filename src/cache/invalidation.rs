/// Write-path cache invalidation
///
/// Each write calls the method matching what it touched; the coordinator
/// knows which cached responses embed that data.
use super::{keys, Cache};
use crate::metrics;
use tracing::debug;

#[derive(Clone)]
pub struct InvalidationCoordinator {
    cache: Cache,
}

impl InvalidationCoordinator {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    async fn purge(&self, scope: &str, keys: Vec<String>) -> u64 {
        let removed = self.cache.invalidate(&keys).await;
        debug!("Invalidated {} cache keys for {}: {:?}", removed, scope, keys);
        metrics::record_invalidation(scope, removed);
        removed
    }

    fn detail_and_lists(tool_id: &str, slugs: &[&str]) -> Vec<String> {
        let mut keys = vec![
            keys::ALL_TOOLS.to_string(),
            keys::FEATURED_TOOLS.to_string(),
            keys::tool_by_id(tool_id),
        ];
        for slug in slugs {
            let key = keys::tool_by_slug(slug);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// A tool was created; only the list views can hold it
    pub async fn tool_created(&self) -> u64 {
        self.purge(
            "tool",
            vec![keys::ALL_TOOLS.to_string(), keys::FEATURED_TOOLS.to_string()],
        )
        .await
    }

    /// Tool content, status or featured flag changed, or the tool was deleted
    ///
    /// Pass both the previous and the current slug when a rename changed it.
    pub async fn tool_changed(&self, tool_id: &str, slugs: &[&str]) -> u64 {
        self.purge("tool", Self::detail_and_lists(tool_id, slugs)).await
    }

    /// A rating was created or updated
    pub async fn rating_changed(&self, tool_id: &str, slug: &str) -> u64 {
        self.purge("rating", Self::detail_and_lists(tool_id, &[slug]))
            .await
    }

    /// Media was added, edited or removed
    pub async fn media_changed(&self, tool_id: &str, slug: &str) -> u64 {
        self.purge("media", Self::detail_and_lists(tool_id, &[slug]))
            .await
    }

    /// A new view moved the analytics counters
    pub async fn view_recorded(&self, tool_id: &str, slug: &str) -> u64 {
        self.purge("view", Self::detail_and_lists(tool_id, &[slug]))
            .await
    }

    /// Any comment of the tool changed; every cached page is dropped
    pub async fn comments_changed(&self, tool_id: &str) -> u64 {
        let removed = self
            .cache
            .invalidate_prefix(&keys::comments_prefix(tool_id))
            .await;
        debug!("Invalidated {} comment pages for tool {}", removed, tool_id);
        metrics::record_invalidation("comment", removed);
        removed
    }

    /// A comment write moved the counters embedded in the tool document
    pub async fn comment_counters_changed(&self, tool_id: &str, slug: Option<&str>) -> u64 {
        let pages = self.comments_changed(tool_id).await;
        let slugs: Vec<&str> = slug.into_iter().collect();
        pages
            + self
                .purge("comment", Self::detail_and_lists(tool_id, &slugs))
                .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::settings;

    async fn seed(cache: &Cache, keys: &[String]) {
        for key in keys {
            cache.put_json(key, &"cached", 60).await;
        }
    }

    async fn present(cache: &Cache, key: &str) -> bool {
        cache.get_json::<String>("test", key).await.is_some()
    }

    #[tokio::test]
    async fn test_rename_purges_old_and_new_slug() {
        let cache = Cache::in_memory(settings());
        let coordinator = InvalidationCoordinator::new(cache.clone());

        let all = vec![
            keys::ALL_TOOLS.to_string(),
            keys::FEATURED_TOOLS.to_string(),
            keys::tool_by_id("t1"),
            keys::tool_by_slug("old-name"),
            keys::tool_by_slug("new-name"),
            keys::tool_by_id("t2"),
        ];
        seed(&cache, &all).await;

        let removed = coordinator
            .tool_changed("t1", &["old-name", "new-name"])
            .await;
        assert_eq!(removed, 5);
        assert!(!present(&cache, &keys::tool_by_slug("old-name")).await);
        assert!(present(&cache, &keys::tool_by_id("t2")).await);
    }

    #[tokio::test]
    async fn test_comment_mutation_drops_every_viewer_page() {
        let cache = Cache::in_memory(settings());
        let coordinator = InvalidationCoordinator::new(cache.clone());

        let pages = vec![
            keys::comment_page("t1", 1, 10, "newest", None),
            "comments:t1:1:10:newest:admin-u1".to_string(),
            "comments:t1:3:50:popular:user-u2".to_string(),
            keys::comment_page("t2", 1, 10, "newest", None),
        ];
        seed(&cache, &pages).await;

        assert_eq!(coordinator.comments_changed("t1").await, 3);
        assert!(present(&cache, &pages[3]).await);
    }

    #[tokio::test]
    async fn test_comment_counter_change_drops_tool_documents() {
        let cache = Cache::in_memory(settings());
        let coordinator = InvalidationCoordinator::new(cache.clone());

        let cached = vec![
            keys::ALL_TOOLS.to_string(),
            keys::FEATURED_TOOLS.to_string(),
            keys::tool_by_id("t1"),
            keys::tool_by_slug("tool"),
            keys::comment_page("t1", 1, 10, "newest", None),
            keys::tool_by_id("t2"),
        ];
        seed(&cache, &cached).await;

        assert_eq!(coordinator.comment_counters_changed("t1", Some("tool")).await, 5);
        assert!(!present(&cache, &keys::tool_by_slug("tool")).await);
        assert!(present(&cache, &keys::tool_by_id("t2")).await);
    }

    #[tokio::test]
    async fn test_created_tool_only_touches_lists() {
        let cache = Cache::in_memory(settings());
        let coordinator = InvalidationCoordinator::new(cache.clone());

        seed(
            &cache,
            &[keys::ALL_TOOLS.to_string(), keys::tool_by_id("t1")],
        )
        .await;

        assert_eq!(coordinator.tool_created().await, 1);
        assert!(present(&cache, &keys::tool_by_id("t1")).await);
    }
}
