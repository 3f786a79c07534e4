//! Listing of visible pages along the topic and country taxonomies.
//!
//! Every listing is ordered by descending original timestamp and filtered by
//! the [`Visibility`] rules. The result shape depends on which selectors are
//! given:
//!
//! | topic | country | shape |
//! |-------|---------|-------|
//! | yes | yes | flat list |
//! | yes | no | country key → list |
//! | no | yes | topic key → list |
//! | no | no | outer key → inner key → list |
//!
//! Pagination applies independently to every list in the result.

use crate::error::{Error, Result};
use crate::models::PageView;
use crate::store::{PageQuery, PageStore};
use crate::taxonomy::{COUNTRIES, TOPICS};
use crate::visibility::Visibility;
use futures::future::try_join_all;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, instrument};

pub const DEFAULT_START: &str = "0";
pub const DEFAULT_LIMIT: &str = "10";

/// A validated `start`/`limit` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub start: usize,
    pub limit: usize,
}

impl Pagination {
    pub fn new(start: usize, limit: usize) -> Self {
        Self { start, limit }
    }

    /// Parse raw query-string values. Both must be non-negative decimal
    /// integers; nothing is coerced.
    pub fn parse(start: Option<&str>, limit: Option<&str>) -> Result<Self> {
        let start = parse_decimal(start.unwrap_or(DEFAULT_START))?;
        let limit = parse_decimal(limit.unwrap_or(DEFAULT_LIMIT))?;
        Ok(Self::new(start, limit))
    }
}

/// Digits only. A value too large for `usize` is still an integer and
/// saturates at `usize::MAX`.
fn parse_decimal(s: &str) -> Result<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_pagination());
    }
    Ok(s.parse().unwrap_or(usize::MAX))
}

/// Nesting order of a listing with no selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    #[default]
    TopicFirst,
    CountryFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Listing {
    Flat(Vec<PageView>),
    Grouped(IndexMap<String, Vec<PageView>>),
    Nested(IndexMap<String, IndexMap<String, Vec<PageView>>>),
}

/// Selectors and window for one listing request.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub topic: Option<String>,
    pub country: Option<String>,
    pub grouping: Grouping,
}

type Labels = &'static [&'static str];

async fn fetch<S: PageStore + ?Sized>(
    store: &S,
    visibility: &Visibility,
    topics: Labels,
    countries: Labels,
    pagination: Pagination,
) -> Result<Vec<PageView>> {
    let query = PageQuery {
        visibility: Some(visibility.clone()),
        topics: Some(topics),
        countries: Some(countries),
        ..Default::default()
    };
    let pages = store.find(&query, pagination.start, pagination.limit).await?;
    Ok(pages.into_iter().map(PageView::from).collect())
}

/// One list per `(key, labels)` entry of `axis`, with the other axis fixed.
async fn fetch_grouped<S, F>(
    store: &S,
    visibility: &Visibility,
    axis: impl Iterator<Item = (&'static str, Labels)>,
    selectors: F,
    pagination: Pagination,
) -> Result<IndexMap<String, Vec<PageView>>>
where
    S: PageStore + ?Sized,
    F: Fn(Labels) -> (Labels, Labels),
{
    let (keys, lists): (Vec<_>, Vec<_>) = axis
        .map(|(key, labels)| {
            let (topics, countries) = selectors(labels);
            (key.to_string(), fetch(store, visibility, topics, countries, pagination))
        })
        .unzip();
    let lists = try_join_all(lists).await?;
    Ok(keys.into_iter().zip(lists).collect())
}

/// List visible pages for the given selectors.
#[instrument(level = "info", skip(store))]
pub async fn list<S: PageStore + ?Sized>(store: &S, request: &ListRequest, pagination: Pagination) -> Result<Listing> {
    let visibility = Visibility::current(store).await?;
    let topic = request.topic.as_deref().map(|k| TOPICS.labels(k));
    let country = request.country.as_deref().map(|k| COUNTRIES.labels(k));
    debug!(?topic, ?country, "Resolved selectors");

    let listing = match (topic, country) {
        (Some(topics), Some(countries)) => {
            Listing::Flat(fetch(store, &visibility, topics, countries, pagination).await?)
        }
        (Some(topics), None) => Listing::Grouped(
            fetch_grouped(store, &visibility, COUNTRIES.entries(), |c| (topics, c), pagination).await?,
        ),
        (None, Some(countries)) => Listing::Grouped(
            fetch_grouped(store, &visibility, TOPICS.entries(), |t| (t, countries), pagination).await?,
        ),
        (None, None) => {
            let mut nested = IndexMap::new();
            match request.grouping {
                Grouping::TopicFirst => {
                    for (topic, topics) in TOPICS.entries() {
                        let inner =
                            fetch_grouped(store, &visibility, COUNTRIES.entries(), |c| (topics, c), pagination)
                                .await?;
                        nested.insert(topic.to_string(), inner);
                    }
                }
                Grouping::CountryFirst => {
                    for (country, countries) in COUNTRIES.entries() {
                        let inner =
                            fetch_grouped(store, &visibility, TOPICS.entries(), |t| (t, countries), pagination)
                                .await?;
                        nested.insert(country.to_string(), inner);
                    }
                }
            }
            Listing::Nested(nested)
        }
    };
    Ok(listing)
}
