//! Raw page → canonical [`Page`].
//!
//! Pages without a translated title are rejected. Topics are every raw label
//! except the COVID-19 relevance label, and snippets are regrouped under
//! canonical topic keys with a "general" fallback for topics that have none.

use crate::models::{Content, Page, RawPage};
use crate::taxonomy::{COVID_RELEVANCE_LABEL, TOPICS};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

/// Normalize a raw record, or `None` when it must not be stored.
#[instrument(level = "debug", skip_all, fields(url = %raw.url))]
pub fn normalize(raw: &RawPage) -> Option<Page> {
    let Some(ja_translated) = translated(raw) else {
        debug!("no translated title; rejecting page");
        return None;
    };

    let topics = raw
        .labels
        .iter()
        .filter(|label| label.as_str() != COVID_RELEVANCE_LABEL)
        .cloned()
        .collect();

    Some(Page {
        country: raw.country.clone(),
        displayed_country: raw.country.clone(),
        orig: Content {
            title: raw.orig.title.trim().to_string(),
            timestamp: raw.orig.timestamp.clone(),
        },
        ja_translated,
        url: raw.url.clone(),
        topics,
        snippets: reshape_snippets(&raw.snippets),
        is_checked: 0,
        is_about_covid_19: raw.classes.is_about_covid_19,
        // Automatic usefulness scores are discarded; only reviewers judge usefulness.
        is_useful: -1,
        is_clear: raw.classes.is_clear,
        is_about_false_rumor: raw.classes.is_about_false_rumor,
        is_hidden: 0,
    })
}

fn translated(raw: &RawPage) -> Option<Content> {
    let ja = raw.ja_translated.as_ref()?;
    let title = ja.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return None;
    }
    Some(Content {
        title: title.to_string(),
        timestamp: ja.timestamp.clone().unwrap_or_default(),
    })
}

/// First snippet found scanning canonical topics in declaration order.
fn general_snippet(snippets: &HashMap<String, Vec<String>>) -> Option<&str> {
    TOPICS
        .entries()
        .flat_map(|(_, labels)| labels.iter())
        .find_map(|label| snippets.get(*label).and_then(|s| s.first()))
        .map(String::as_str)
}

/// Regroup per-label snippets under canonical topic keys.
pub fn reshape_snippets(snippets: &HashMap<String, Vec<String>>) -> BTreeMap<String, String> {
    let general = general_snippet(snippets).filter(|s| !s.is_empty());
    let mut reshaped = BTreeMap::new();
    for (topic, labels) in TOPICS.entries() {
        let own = labels
            .iter()
            .find_map(|label| snippets.get(*label).and_then(|s| s.first()));
        match (own, general) {
            (Some(snippet), _) => {
                reshaped.insert(topic.to_string(), snippet.trim().to_string());
            }
            (None, Some(general)) => {
                reshaped.insert(topic.to_string(), general.to_string());
            }
            (None, None) => {}
        }
    }
    reshaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classes, RawContent};

    fn raw_page(labels: &[&str], snippets: &[(&str, &[&str])]) -> RawPage {
        RawPage {
            url: "https://example.com/news/1".to_string(),
            country: "jp".to_string(),
            orig: Content {
                title: "  元の見出し  ".to_string(),
                timestamp: "2020-04-01T10:00:00.000000".to_string(),
            },
            ja_translated: Some(RawContent {
                title: Some(" 翻訳された見出し ".to_string()),
                timestamp: Some("2020-04-01T10:05:00.000000".to_string()),
            }),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            snippets: snippets
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
            classes: Classes {
                is_about_covid_19: 1,
                is_useful: 1,
                is_clear: 1,
                is_about_false_rumor: 0,
            },
        }
    }

    #[test]
    fn test_rejects_missing_translation() {
        let mut raw = raw_page(&["感染状況"], &[]);
        raw.ja_translated = None;
        assert!(normalize(&raw).is_none());
    }

    #[test]
    fn test_rejects_blank_translation() {
        let mut raw = raw_page(&["感染状況"], &[]);
        raw.ja_translated = Some(RawContent {
            title: Some("   ".to_string()),
            timestamp: None,
        });
        assert!(normalize(&raw).is_none());

        raw.ja_translated = Some(RawContent::default());
        assert!(normalize(&raw).is_none());
    }

    #[test]
    fn test_topics_and_general_snippet_fallback() {
        let raw = raw_page(
            &["is_about_COVID-19", "感染状況", "経済・福祉政策"],
            &[("感染状況", &["  感染者が増加  ", "second"])],
        );

        let page = normalize(&raw).unwrap();
        assert_eq!(page.topics, vec!["感染状況", "経済・福祉政策"]);
        assert_eq!(page.snippets["感染状況"], "感染者が増加");
        // Topics without their own snippet fall back to the general one.
        assert_eq!(page.snippets["経済・福祉政策"], "  感染者が増加  ");
        assert_eq!(page.snippets.len(), TOPICS.keys().count());
    }

    #[test]
    fn test_own_snippet_wins_over_general() {
        let raw = raw_page(
            &["感染状況", "経済・福祉政策"],
            &[("感染状況", &["infection"]), ("経済・福祉政策", &["economy"])],
        );
        let page = normalize(&raw).unwrap();
        assert_eq!(page.snippets["感染状況"], "infection");
        assert_eq!(page.snippets["経済・福祉政策"], "economy");
        assert_eq!(page.snippets["その他"], "infection");
    }

    #[test]
    fn test_snippets_roll_up_raw_labels() {
        let raw = raw_page(&["芸能・スポーツ"], &[("芸能・スポーツ", &["match postponed"])]);
        let page = normalize(&raw).unwrap();
        assert_eq!(page.snippets["その他"], "match postponed");
    }

    #[test]
    fn test_no_snippets_at_all() {
        let raw = raw_page(&["感染状況"], &[]);
        let page = normalize(&raw).unwrap();
        assert!(page.snippets.is_empty());
    }

    #[test]
    fn test_moderation_fields_initialized() {
        let raw = raw_page(&["感染状況"], &[]);
        let page = normalize(&raw).unwrap();
        assert_eq!(page.is_useful, -1);
        assert_eq!(page.is_checked, 0);
        assert_eq!(page.is_about_covid_19, 1);
        assert_eq!(page.displayed_country, "jp");
        assert_eq!(page.orig.title, "元の見出し");
        assert_eq!(page.ja_translated.title, "翻訳された見出し");
    }
}
