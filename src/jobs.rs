//! Batch jobs run from the command line.
//!
//! `update_database` runs these steps against the page store:
//! 1. **Ingestion**: upsert every record of the article list
//! 2. **Crowd-sourcing**: apply result batches, oldest first
//! 3. **Topic checks**: apply the reviewers' topic-check log
//! 4. **Category checks**: replay the audited category corrections
//! 5. **Announcement** (optional): queue one newly inserted useful page

use crate::config::AppConfig;
use crate::error::Result;
use crate::feeds::{read_crowd_sourcing_batches, read_jsonl, read_jsonl_if_exists};
use crate::merge::{
    CorrectionOutcome, ReplaySummary, UpsertStatus, apply_correction_log, apply_crowd_sourcing_results,
    apply_manual_topic_check, replay_category_check_log, upsert,
};
use crate::models::{CategoryCheck, Page, RawPage, TopicCheck};
use crate::outputs::announce::{Announcement, enqueue};
use crate::outputs::meta::write_sources;
use crate::store::{PageQuery, PageStore};
use tracing::{info, instrument};

/// Counters for one `update_database` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: usize,
    /// Pages in the store after ingestion.
    pub total_pages: usize,
    pub crowd_sourcing: ReplaySummary,
    pub topic_checks: usize,
    pub category_checks: usize,
    pub announced: Option<Announcement>,
}

#[instrument(level = "info", skip_all, fields(announce))]
pub async fn update_database<S: PageStore + ?Sized>(
    store: &S,
    config: &AppConfig,
    announce: bool,
) -> Result<UpdateReport> {
    let mut report = UpdateReport::default();

    info!(path = %config.data.article_list.display(), "Adding automatically classified pages");
    let raw_pages: Vec<RawPage> = read_jsonl(&config.data.article_list).await?;
    let mut candidates: Vec<Page> = Vec::new();
    for raw in &raw_pages {
        match upsert(store, raw).await? {
            None => report.rejected += 1,
            Some(outcome) => match outcome.status {
                UpsertStatus::Inserted => {
                    report.inserted += 1;
                    if outcome.auto_useful {
                        candidates.push(outcome.page);
                    }
                }
                UpsertStatus::Updated => report.updated += 1,
                UpsertStatus::Unchanged => report.unchanged += 1,
            },
        }
    }
    report.total_pages = store.count(&PageQuery::default()).await?;
    info!(
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        rejected = report.rejected,
        total_pages = report.total_pages,
        "Ingestion complete"
    );

    let batches = read_crowd_sourcing_batches(&config.crowdsourcing.result_dir).await?;
    report.crowd_sourcing = apply_crowd_sourcing_results(store, &batches).await?;

    info!("Adding manually checked pages");
    let topic_checks: Vec<TopicCheck> = read_jsonl_if_exists(&config.data.topic_check_log).await?;
    for check in &topic_checks {
        if apply_manual_topic_check(store, check).await? {
            report.topic_checks += 1;
        }
    }
    info!(applied = report.topic_checks, total = topic_checks.len(), "Topic checks applied");

    let category_checks = config.audit_log().read_all().await?;
    report.category_checks = replay_category_check_log(store, &category_checks).await?;

    if announce {
        report.announced = enqueue(&config.announce.queue_path, &candidates).await?;
    }
    Ok(report)
}

/// Rebuild `sources.json` from the configured site list.
#[instrument(level = "info", skip_all)]
pub async fn update_sources(config: &AppConfig) -> Result<usize> {
    let sources = write_sources(&config.data.site_list, &config.data.meta_dir).await?;
    Ok(sources.len())
}

/// Apply one category correction and append it to the audit log.
pub async fn correct<S: PageStore + ?Sized>(
    store: &S,
    config: &AppConfig,
    check: &CategoryCheck,
) -> Result<CorrectionOutcome> {
    apply_correction_log(store, check, &config.audit_log()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::path::{Path, PathBuf};

    fn workspace(name: &str) -> (PathBuf, AppConfig) {
        let dir = std::env::temp_dir().join(format!("covid_news_index-jobs-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = AppConfig::default();
        config.data.article_list = dir.join("article_list.jsonl");
        config.data.topic_check_log = dir.join("topic_check_log.jsonl");
        config.data.category_check_log = dir.join("category_check_log.jsonl");
        config.data.site_list = dir.join("site_list.json");
        config.data.meta_dir = dir.join("meta");
        config.crowdsourcing.result_dir = dir.join("crowdsourcing");
        config.announce.queue_path = dir.join("announce_queue.jsonl");
        (dir, config)
    }

    fn raw(url: &str, timestamp: &str, useful: i64) -> serde_json::Value {
        json!({
            "url": url,
            "country": "jp",
            "orig": {"title": "元の見出し", "timestamp": timestamp},
            "ja_translated": {"title": "見出し", "timestamp": timestamp},
            "labels": ["is_about_COVID-19", "感染状況"],
            "snippets": {"感染状況": ["感染者が増えた"]},
            "classes": {"is_about_COVID-19": 1, "is_useful": useful, "is_clear": 1, "is_about_false_rumor": 0}
        })
    }

    fn write_lines(path: &Path, values: &[serde_json::Value]) {
        let text: String = values.iter().map(|v| format!("{v}\n")).collect();
        std::fs::write(path, text).unwrap();
    }

    #[tokio::test]
    async fn test_update_database_end_to_end() {
        let (dir, config) = workspace("update");
        write_lines(
            &config.data.article_list,
            &[
                raw("a", "2020-05-01T00:00:00.000000", 1),
                raw("b", "2020-05-02T00:00:00.000000", 0),
                json!({"url": "untranslated", "country": "us", "orig": {"title": "t", "timestamp": "2020-05-02T00:00:00.000000"}}),
            ],
        );
        write_lines(
            &config.data.topic_check_log,
            &[json!({
                "url": "b",
                "is_about_COVID-19": 1,
                "is_useful": 0,
                "new_country": "us",
                "new_topics": ["その他"],
                "hidden": 1
            })],
        );
        write_lines(
            &config.data.category_check_log,
            &[json!({"url": "a", "new_country": "int", "new_topics": ["経済・福祉政策"]})],
        );

        let store = MemoryStore::new();
        let report = update_database(&store, &config, true).await.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.total_pages, 2);
        assert_eq!(report.topic_checks, 1);
        assert_eq!(report.category_checks, 1);
        assert_eq!(report.announced.as_ref().map(|a| a.url.as_str()), Some("a"));

        let b = store.find_by_url("b").await.unwrap().unwrap();
        assert_eq!(b.is_checked, 1);
        assert_eq!(b.is_hidden, 1);
        assert_eq!(b.displayed_country, "us");
        assert_eq!(b.topics, vec!["その他"]);

        let a = store.find_by_url("a").await.unwrap().unwrap();
        assert_eq!(a.displayed_country, "int");
        assert_eq!(a.country, "jp");

        // A second run inserts nothing and announces nothing.
        let again = update_database(&store, &config, true).await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.unchanged, 2);
        assert_eq!(again.announced, None);
        let queued = std::fs::read_to_string(&config.announce.queue_path).unwrap();
        assert_eq!(queued.lines().count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_update_database_requires_article_list() {
        let (dir, config) = workspace("missing");
        let store = MemoryStore::new();
        assert!(update_database(&store, &config, false).await.is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_correct_then_replay() {
        let (dir, config) = workspace("correct");
        let store = MemoryStore::new();
        let check = CategoryCheck {
            url: "unknown".into(),
            new_country: "jp".into(),
            new_topics: vec!["その他".into()],
        };
        assert_eq!(correct(&store, &config, &check).await.unwrap(), CorrectionOutcome::CreatedPartial);
        assert_eq!(config.audit_log().read_all().await.unwrap(), vec![check]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_update_sources_writes_file() {
        let (dir, config) = workspace("sources");
        std::fs::write(
            &config.data.site_list,
            json!({"domains": {"cdc.gov": {"region": "us", "sources": ["www.cdc.gov"]}}}).to_string(),
        )
        .unwrap();
        assert_eq!(update_sources(&config).await.unwrap(), 1);
        let written = std::fs::read_to_string(config.data.meta_dir.join("sources.json")).unwrap();
        assert!(written.contains("http://www.cdc.gov"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
