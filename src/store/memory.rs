//! In-memory [`PageStore`].
//!
//! Pages live in an insertion-ordered map behind a single `RwLock`, so every
//! write is atomic and listings read a consistent snapshot.

use super::{PageQuery, PageStore, PageUpdate, UpdateResult};
use crate::error::Result;
use crate::models::Page;
use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: RwLock<IndexMap<String, Page>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<Page>> {
        Ok(self.pages.read().await.get(url).cloned())
    }

    async fn find(&self, query: &PageQuery, skip: usize, limit: usize) -> Result<Vec<Page>> {
        let pages = self.pages.read().await;
        let mut matching: Vec<&Page> = pages.values().filter(|p| query.matches(p)).collect();
        // Stable sort keeps insertion order for equal timestamps.
        matching.sort_by(|a, b| b.timestamp().cmp(a.timestamp()));
        Ok(matching.into_iter().skip(skip).take(limit).cloned().collect())
    }

    async fn count(&self, query: &PageQuery) -> Result<usize> {
        Ok(self.pages.read().await.values().filter(|p| query.matches(p)).count())
    }

    async fn insert(&self, page: Page) -> Result<bool> {
        let mut pages = self.pages.write().await;
        if pages.contains_key(&page.url) {
            return Ok(false);
        }
        pages.insert(page.url.clone(), page);
        Ok(true)
    }

    async fn replace_if_newer(&self, page: Page) -> Result<bool> {
        let mut pages = self.pages.write().await;
        match pages.get_mut(&page.url) {
            Some(stored) if page.timestamp() > stored.timestamp() => {
                *stored = page;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_by_url(&self, url: &str, update: &PageUpdate, upsert: bool) -> Result<UpdateResult> {
        let mut pages = self.pages.write().await;
        match pages.get_mut(url) {
            Some(stored) if update.admits(stored) => {
                update.apply(stored);
                Ok(UpdateResult::Updated)
            }
            Some(_) => Ok(UpdateResult::Stale),
            None if upsert => {
                let mut page = Page::partial(url);
                update.apply(&mut page);
                pages.insert(url.to_string(), page);
                Ok(UpdateResult::Inserted)
            }
            None => Ok(UpdateResult::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, timestamp: &str) -> Page {
        let mut page = Page::partial(url);
        page.orig.timestamp = timestamp.to_string();
        page
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_url() {
        let store = MemoryStore::new();
        assert!(store.insert(page("u", "2020-05-01")).await.unwrap());
        assert!(!store.insert(page("u", "2020-06-01")).await.unwrap());
        let stored = store.find_by_url("u").await.unwrap().unwrap();
        assert_eq!(stored.timestamp(), "2020-05-01");
    }

    #[tokio::test]
    async fn test_replace_only_when_strictly_newer() {
        let store = MemoryStore::new();
        store.insert(page("u", "2020-05-01")).await.unwrap();
        assert!(!store.replace_if_newer(page("u", "2020-05-01")).await.unwrap());
        assert!(!store.replace_if_newer(page("u", "2020-04-01")).await.unwrap());
        assert!(store.replace_if_newer(page("u", "2020-05-02")).await.unwrap());
        assert!(!store.replace_if_newer(page("missing", "2020-05-02")).await.unwrap());
        assert_eq!(store.find_by_url("u").await.unwrap().unwrap().timestamp(), "2020-05-02");
    }

    #[tokio::test]
    async fn test_find_sorts_descending_with_stable_ties() {
        let store = MemoryStore::new();
        for (url, ts) in [("a", "2020-05-01"), ("b", "2020-05-03"), ("c", "2020-05-01"), ("d", "2020-05-02")] {
            store.insert(page(url, ts)).await.unwrap();
        }
        let urls: Vec<String> = store
            .find(&PageQuery::default(), 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();
        assert_eq!(urls, vec!["b", "d", "a", "c"]);

        let window = store.find(&PageQuery::default(), 1, 2).await.unwrap();
        assert_eq!(window.iter().map(|p| p.url.as_str()).collect::<Vec<_>>(), vec!["d", "a"]);
        assert!(store.find(&PageQuery::default(), 4, 2).await.unwrap().is_empty());
        assert!(store.find(&PageQuery::default(), 0, 0).await.unwrap().is_empty());
        assert_eq!(store.count(&PageQuery::default()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_update_by_url_outcomes() {
        let store = MemoryStore::new();
        store.insert(page("u", "2020-05-01")).await.unwrap();

        let update = PageUpdate {
            displayed_country: Some("fr".into()),
            ..Default::default()
        };
        assert_eq!(store.update_by_url("u", &update, false).await.unwrap(), UpdateResult::Updated);
        assert_eq!(store.update_by_url("v", &update, false).await.unwrap(), UpdateResult::NotFound);
        assert_eq!(store.update_by_url("v", &update, true).await.unwrap(), UpdateResult::Inserted);
        assert_eq!(store.find_by_url("v").await.unwrap().unwrap().displayed_country, "fr");

        let guarded = PageUpdate {
            older_than: Some("2020-04-01".into()),
            ..update
        };
        assert_eq!(store.update_by_url("u", &guarded, false).await.unwrap(), UpdateResult::Stale);
    }
}
