//! Static topic and country taxonomies.
//!
//! Each taxonomy maps a canonical key to the raw labels that roll up into it.
//! Both expose a reserved [`ALL`] key whose label set is the union of every
//! other key's labels. Tables are built once and never mutated.
//!
//! An unknown key resolves to an empty label set, and an empty label set
//! matches nothing.

use itertools::Itertools;
use once_cell::sync::Lazy;

/// Reserved aggregate key present in every taxonomy.
pub const ALL: &str = "all";

/// Raw label marking a page as COVID-19 related. Never a topic.
pub const COVID_RELEVANCE_LABEL: &str = "is_about_COVID-19";

/// An ordered canonical-key → raw-labels table.
#[derive(Debug)]
pub struct Taxonomy {
    entries: Vec<(&'static str, Vec<&'static str>)>,
    all: Vec<&'static str>,
}

impl Taxonomy {
    fn new(entries: &[(&'static str, &[&'static str])]) -> Self {
        let entries: Vec<(&'static str, Vec<&'static str>)> = entries
            .iter()
            .map(|(key, labels)| (*key, labels.to_vec()))
            .collect();
        let all = entries
            .iter()
            .flat_map(|(_, labels)| labels.iter().copied())
            .unique()
            .collect();
        Self { entries, all }
    }

    /// Raw labels subsumed by `key`; empty for unknown keys.
    pub fn labels(&self, key: &str) -> &[&'static str] {
        if key == ALL {
            return &self.all;
        }
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, labels)| labels.as_slice())
            .unwrap_or(&[])
    }

    /// Canonical keys other than [`ALL`], in declaration order.
    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    /// `(key, labels)` pairs other than [`ALL`], in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &[&'static str])> + '_ {
        self.entries.iter().map(|(key, labels)| (*key, labels.as_slice()))
    }
}

const TOPIC_TABLE: &[(&str, &[&str])] = &[
    ("感染状況", &["感染状況"]),
    ("予防・緊急事態宣言", &["予防・緊急事態宣言"]),
    ("症状・治療・検査など医療情報", &["症状・治療・検査など医療情報"]),
    ("経済・福祉政策", &["経済・福祉政策"]),
    ("休校・オンライン授業", &["休校・オンライン授業"]),
    ("その他", &["その他", "芸能・スポーツ"]),
];

const COUNTRY_TABLE: &[(&str, &[&str])] = &[
    ("jp", &["jp"]),
    ("cn", &["cn"]),
    ("us", &["us"]),
    ("eu", &["eu"]),
    ("fr", &["fr"]),
    ("es", &["es"]),
    ("de", &["de"]),
    ("in", &["in"]),
    ("kr", &["kr"]),
    ("int", &["int"]),
    ("eur", &["eu", "fr", "es", "de"]),
    ("asia", &["in", "kr"]),
];

pub static TOPICS: Lazy<Taxonomy> = Lazy::new(|| Taxonomy::new(TOPIC_TABLE));

pub static COUNTRIES: Lazy<Taxonomy> = Lazy::new(|| Taxonomy::new(COUNTRY_TABLE));
