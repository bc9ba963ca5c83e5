//! Whole-response caching for pages that may be served slightly stale.

use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use bytes::Bytes;
use headers::ContentType;
use moka::future::Cache;
use std::{
    fmt::{Debug, Formatter},
    time::Duration,
};

const MAX_CACHED_PAGES: u64 = 1024;

/// Rendered JSON bodies keyed by request path and query.
///
/// An entry is served unchanged until it expires or [`PageCache::clear`] is called, no
/// matter how the underlying data changes in between.
#[derive(Clone)]
pub struct PageCache {
    pages: Cache<String, Bytes>,
}

/// A JSON body as stored in (or freshly rendered for) the [`PageCache`].
#[derive(Clone, Debug)]
pub struct CachedPage(pub Bytes);

impl PageCache {
    #[must_use]
    pub fn new(time_to_live: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(MAX_CACHED_PAGES)
            .time_to_live(time_to_live)
            .build();

        Self { pages }
    }

    pub async fn get(&self, key: &str) -> Option<CachedPage> {
        self.pages.get(key).await.map(CachedPage)
    }

    pub async fn insert(&self, key: String, page: &CachedPage) {
        self.pages.insert(key, page.0.clone()).await;
    }

    pub fn clear(&self) {
        self.pages.invalidate_all();
    }
}

impl Debug for PageCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("entry_count", &self.pages.entry_count())
            .finish()
    }
}

impl IntoResponse for CachedPage {
    fn into_response(self) -> Response {
        (TypedHeader(ContentType::json()), self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{CachedPage, PageCache};
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn entries_survive_until_cleared() {
        let cache = PageCache::new(Duration::from_secs(60));
        assert!(cache.get("/").await.is_none());

        cache
            .insert("/".to_owned(), &CachedPage(Bytes::from_static(b"{}")))
            .await;
        assert_eq!(cache.get("/").await.unwrap().0, Bytes::from_static(b"{}"));
        assert!(cache.get("/?page=2").await.is_none());

        cache.clear();
        assert!(cache.get("/").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = PageCache::new(Duration::from_millis(50));
        cache
            .insert("/".to_owned(), &CachedPage(Bytes::from_static(b"{}")))
            .await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get("/").await.is_none());
    }
}
