//! Data models for pages, feed records and API output.
//!
//! This module defines the shapes that cross the core's boundaries:
//! - [`RawPage`]: an incoming record from the ingestion feed
//! - [`Page`]: the canonical stored shape, one per URL
//! - [`PageView`]: a page reshaped for API output
//! - Correction records: [`TopicCheck`], [`CategoryCheck`], [`CrowdSourcingRecord`]
//!
//! Field names follow the JSON documents exchanged with the classifier and the
//! crowd-sourcing tools, hence the `is_about_COVID-19` renames.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A title together with the time it was observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Content {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub timestamp: String,
}

/// The canonical stored page.
///
/// Every field has a default so that partial pages created by the
/// correction-log path round-trip through the store.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Page {
    /// Country of origin. Never changed after creation.
    pub country: String,
    /// Country shown to readers; corrected independently of `country`.
    pub displayed_country: String,
    pub orig: Content,
    pub ja_translated: Content,
    pub url: String,
    pub topics: Vec<String>,
    /// Topic → representative excerpt.
    pub snippets: BTreeMap<String, String>,
    pub is_checked: i64,
    #[serde(rename = "is_about_COVID-19")]
    pub is_about_covid_19: i64,
    /// -1 unjudged, 0 judged not useful, 1 judged useful.
    pub is_useful: i64,
    pub is_clear: i64,
    pub is_about_false_rumor: i64,
    pub is_hidden: i64,
}

impl Page {
    /// A page holding nothing but its URL.
    pub fn partial(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.orig.timestamp
    }

    pub fn is_checked(&self) -> bool {
        self.is_checked == 1
    }
}

/// Title/timestamp pair as it arrives from the translation step; either part may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Automatic classification scores attached to a raw page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Classes {
    #[serde(rename = "is_about_COVID-19")]
    pub is_about_covid_19: i64,
    pub is_useful: i64,
    pub is_clear: i64,
    pub is_about_false_rumor: i64,
}

/// A page record from the ingestion feed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage {
    pub url: String,
    pub country: String,
    pub orig: Content,
    #[serde(default)]
    pub ja_translated: Option<RawContent>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Raw label → snippets found for that label.
    #[serde(default)]
    pub snippets: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub classes: Classes,
}

/// A manual topic-check result.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicCheck {
    pub url: String,
    #[serde(rename = "is_about_COVID-19")]
    pub is_about_covid_19: i64,
    pub is_useful: i64,
    #[serde(default)]
    pub is_clear: Option<i64>,
    #[serde(default)]
    pub is_about_false_rumor: i64,
    /// Topic → selected flag.
    #[serde(default)]
    pub topics: Option<IndexMap<String, bool>>,
    /// Selected topics as a plain list; wins over `topics` when both are present.
    #[serde(default)]
    pub new_topics: Option<Vec<String>>,
    pub new_country: String,
    #[serde(default, alias = "hidden")]
    pub is_hidden: i64,
}

impl TopicCheck {
    /// Topics the reviewer selected, in the order they were given.
    pub fn selected_topics(&self) -> Vec<String> {
        if let Some(new_topics) = &self.new_topics {
            return new_topics.clone();
        }
        self.topics
            .as_ref()
            .map(|topics| selected(topics))
            .unwrap_or_default()
    }
}

/// A displayed-country/topics correction, also the audit log line format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CategoryCheck {
    pub url: String,
    pub new_country: String,
    pub new_topics: Vec<String>,
}

/// Moderation tags assigned by crowd workers.
#[derive(Debug, Clone, Deserialize)]
pub struct CrowdSourcingTags {
    #[serde(rename = "is_about_COVID-19")]
    pub is_about_covid_19: i64,
    pub is_useful: i64,
    pub is_clear: i64,
    pub is_about_false_rumor: i64,
    #[serde(default)]
    pub topics: IndexMap<String, bool>,
}

impl CrowdSourcingTags {
    pub fn selected_topics(&self) -> Vec<String> {
        selected(&self.topics)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrowdSourcingRecord {
    pub url: String,
    pub tags: CrowdSourcingTags,
}

/// All records produced by one crowd-sourcing run.
#[derive(Debug, Clone)]
pub struct CrowdSourcingBatch {
    /// Start of the crowd-sourcing day, comparable with page timestamps.
    pub timestamp: String,
    pub records: Vec<CrowdSourcingRecord>,
}

fn selected(topics: &IndexMap<String, bool>) -> Vec<String> {
    topics
        .iter()
        .filter(|(_, has_topic)| **has_topic)
        .map(|(topic, _)| topic.clone())
        .collect()
}

/// A topic and its snippet, as shown to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicView {
    pub name: String,
    pub snippet: String,
}

/// A page reshaped for API output: topics carry their snippet and the raw
/// snippet mapping is dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub country: String,
    pub displayed_country: String,
    pub orig: Content,
    pub ja_translated: Content,
    pub url: String,
    pub topics: Vec<TopicView>,
    pub is_checked: i64,
    #[serde(rename = "is_about_COVID-19")]
    pub is_about_covid_19: i64,
    pub is_useful: i64,
    pub is_clear: i64,
    pub is_about_false_rumor: i64,
    pub is_hidden: i64,
}

impl From<Page> for PageView {
    fn from(page: Page) -> Self {
        let topics = page
            .topics
            .into_iter()
            .map(|name| {
                // A topic listed twice gets its snippet both times.
                let snippet = page.snippets.get(&name).cloned().unwrap_or_default();
                TopicView { name, snippet }
            })
            .collect();
        Self {
            country: page.country,
            displayed_country: page.displayed_country,
            orig: page.orig,
            ja_translated: page.ja_translated,
            url: page.url,
            topics,
            is_checked: page.is_checked,
            is_about_covid_19: page.is_about_covid_19,
            is_useful: page.is_useful,
            is_clear: page.is_clear,
            is_about_false_rumor: page.is_about_false_rumor,
            is_hidden: page.is_hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_page_deserialization() {
        let json = r#"{
            "url": "https://example.com/a",
            "country": "jp",
            "orig": {"title": " 見出し ", "timestamp": "2020-04-01T10:00:00.000000"},
            "ja_translated": {"title": "見出し", "timestamp": "2020-04-01T10:05:00.000000"},
            "labels": ["is_about_COVID-19", "感染状況"],
            "snippets": {"感染状況": ["a", "b"]},
            "classes": {"is_about_COVID-19": 1, "is_useful": 1, "is_clear": 0, "is_about_false_rumor": 0}
        }"#;

        let raw: RawPage = serde_json::from_str(json).unwrap();
        assert_eq!(raw.url, "https://example.com/a");
        assert_eq!(raw.labels.len(), 2);
        assert_eq!(raw.classes.is_about_covid_19, 1);
        assert_eq!(raw.snippets["感染状況"], vec!["a", "b"]);
    }

    #[test]
    fn test_raw_page_with_null_translation() {
        let json = r#"{
            "url": "u",
            "country": "us",
            "orig": {"title": "t", "timestamp": "2020-04-01T10:00:00.000000"},
            "ja_translated": {"title": null, "timestamp": null}
        }"#;

        let raw: RawPage = serde_json::from_str(json).unwrap();
        assert!(raw.ja_translated.unwrap().title.is_none());
        assert!(raw.labels.is_empty());
    }

    #[test]
    fn test_page_serializes_covid_flag_name() {
        let page = Page {
            is_about_covid_19: 1,
            ..Page::partial("u")
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["is_about_COVID-19"], 1);
        assert!(json.get("is_about_covid_19").is_none());
    }

    #[test]
    fn test_partial_page_deserializes_with_defaults() {
        let page: Page = serde_json::from_str(r#"{"url": "u", "topics": ["その他"]}"#).unwrap();
        assert_eq!(page.url, "u");
        assert_eq!(page.topics, vec!["その他"]);
        assert_eq!(page.timestamp(), "");
        assert!(!page.is_checked());
    }

    #[test]
    fn test_page_view_pairs_topics_with_snippets() {
        let mut page = Page::partial("u");
        page.topics = vec!["感染状況".to_string(), "その他".to_string()];
        page.snippets.insert("感染状況".to_string(), "増加".to_string());

        let view = PageView::from(page);
        assert_eq!(
            view.topics,
            vec![
                TopicView { name: "感染状況".into(), snippet: "増加".into() },
                TopicView { name: "その他".into(), snippet: String::new() },
            ]
        );
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("snippets").is_none());
    }

    #[test]
    fn test_page_view_repeated_topic_keeps_snippet() {
        let mut page = Page::partial("u");
        page.topics = vec!["感染状況".to_string(), "その他".to_string(), "感染状況".to_string()];
        page.snippets.insert("感染状況".to_string(), "増加".to_string());

        let view = PageView::from(page);
        let snippets: Vec<&str> = view.topics.iter().map(|t| t.snippet.as_str()).collect();
        assert_eq!(snippets, vec!["増加", "", "増加"]);
    }

    #[test]
    fn test_topic_check_prefers_new_topics_list() {
        let json = r#"{
            "url": "u", "is_about_COVID-19": 1, "is_useful": 1,
            "topics": {"感染状況": true, "その他": false},
            "new_topics": ["経済・福祉政策"],
            "new_country": "jp"
        }"#;
        let check: TopicCheck = serde_json::from_str(json).unwrap();
        assert_eq!(check.selected_topics(), vec!["経済・福祉政策"]);
        assert_eq!(check.is_about_false_rumor, 0);
        assert_eq!(check.is_hidden, 0);
    }

    #[test]
    fn test_topic_check_flag_map_and_hidden_alias() {
        let json = r#"{
            "url": "u", "is_about_COVID-19": 1, "is_useful": 0, "is_about_false_rumor": 1,
            "topics": {"その他": true, "感染状況": false, "経済・福祉政策": true},
            "new_country": "us", "hidden": 1
        }"#;
        let check: TopicCheck = serde_json::from_str(json).unwrap();
        assert_eq!(check.selected_topics(), vec!["その他", "経済・福祉政策"]);
        assert_eq!(check.is_hidden, 1);
    }

    #[test]
    fn test_category_check_keeps_non_ascii() {
        let check = CategoryCheck {
            url: "u".into(),
            new_country: "jp".into(),
            new_topics: vec!["感染状況".into()],
        };
        let line = serde_json::to_string(&check).unwrap();
        assert!(line.contains("感染状況"));
    }
}
