//! Page storage boundary.
//!
//! The core talks to storage only through [`PageStore`]. Every write on a
//! single URL is atomic inside the store, and timestamp-guarded writes are
//! conditional updates so concurrent ingestion cannot regress a page.
//!
//! # Backends
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | In-memory | [`memory`] | Tests and ephemeral servers |
//! | SQLite | [`sqlite`] | Durable store shared by the batch job and the API |

use crate::error::Result;
use crate::models::Page;
use crate::visibility::Visibility;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Predicate over stored pages. All set parts must hold.
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    /// Only pages a human has reviewed.
    pub checked_only: bool,
    pub visibility: Option<Visibility>,
    /// Page must carry at least one of these topic labels.
    pub topics: Option<&'static [&'static str]>,
    /// Page country must be one of these labels.
    pub countries: Option<&'static [&'static str]>,
}

impl PageQuery {
    pub fn checked() -> Self {
        Self {
            checked_only: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, page: &Page) -> bool {
        if self.checked_only && !page.is_checked() {
            return false;
        }
        if let Some(visibility) = &self.visibility {
            if !visibility.admits(page) {
                return false;
            }
        }
        if let Some(topics) = self.topics {
            if !page.topics.iter().any(|t| topics.contains(&t.as_str())) {
                return false;
            }
        }
        if let Some(countries) = self.countries {
            if !countries.contains(&page.country.as_str()) {
                return false;
            }
        }
        true
    }
}

/// How a [`PageUpdate`] treats the snippet mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SnippetUpdate {
    #[default]
    Keep,
    /// Keep only snippets of the page's (new) topics; missing ones become "".
    RetainTopics,
}

/// A partial field set applied to one page.
#[derive(Debug, Clone, Default)]
pub struct PageUpdate {
    pub displayed_country: Option<String>,
    pub topics: Option<Vec<String>>,
    pub snippets: SnippetUpdate,
    pub is_checked: Option<i64>,
    pub is_about_covid_19: Option<i64>,
    pub is_useful: Option<i64>,
    pub is_clear: Option<i64>,
    pub is_about_false_rumor: Option<i64>,
    pub is_hidden: Option<i64>,
    /// Apply only if the stored page's timestamp is strictly older than this.
    pub older_than: Option<String>,
}

impl PageUpdate {
    /// Whether the guard allows updating `page`.
    pub fn admits(&self, page: &Page) -> bool {
        match &self.older_than {
            Some(ts) => ts.as_str() > page.timestamp(),
            None => true,
        }
    }

    pub fn apply(&self, page: &mut Page) {
        if let Some(country) = &self.displayed_country {
            page.displayed_country = country.clone();
        }
        if let Some(topics) = &self.topics {
            page.topics = topics.clone();
        }
        if self.snippets == SnippetUpdate::RetainTopics {
            let old = std::mem::take(&mut page.snippets);
            page.snippets = page
                .topics
                .iter()
                .map(|t| (t.clone(), old.get(t).cloned().unwrap_or_default()))
                .collect::<BTreeMap<_, _>>();
        }
        let flags = [
            (self.is_checked, &mut page.is_checked),
            (self.is_about_covid_19, &mut page.is_about_covid_19),
            (self.is_useful, &mut page.is_useful),
            (self.is_clear, &mut page.is_clear),
            (self.is_about_false_rumor, &mut page.is_about_false_rumor),
            (self.is_hidden, &mut page.is_hidden),
        ];
        for (value, field) in flags {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

/// What [`PageStore::update_by_url`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Updated,
    /// No page matched; a partial page was created.
    Inserted,
    NotFound,
    /// A page matched but the timestamp guard rejected the update.
    Stale,
}

#[async_trait]
pub trait PageStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<Page>>;

    /// Matching pages, newest `orig.timestamp` first, ties in storage order.
    async fn find(&self, query: &PageQuery, skip: usize, limit: usize) -> Result<Vec<Page>>;

    async fn count(&self, query: &PageQuery) -> Result<usize>;

    /// Insert `page` unless its URL is already stored. Returns whether it was inserted.
    async fn insert(&self, page: Page) -> Result<bool>;

    /// Replace the stored page with the same URL if `page` is strictly newer.
    async fn replace_if_newer(&self, page: Page) -> Result<bool>;

    /// Apply `update` to the page stored under `url`. With `upsert`, a missing
    /// page is created from [`Page::partial`] first.
    async fn update_by_url(&self, url: &str, update: &PageUpdate, upsert: bool) -> Result<UpdateResult>;
}

/// One fresh, empty store per backend.
#[cfg(test)]
pub(crate) fn test_backends() -> Vec<Box<dyn PageStore>> {
    vec![
        Box::new(MemoryStore::new()),
        Box::new(SqliteStore::open_in_memory().expect("open in-memory SQLite store")),
    ]
}
