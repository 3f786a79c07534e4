//! Readers for the newline-delimited JSON feeds consumed by the batch job.
//!
//! # Feeds
//!
//! | Feed | Record | Missing file |
//! |------|--------|--------------|
//! | Article list | [`RawPage`](crate::models::RawPage) | error |
//! | Topic-check log | [`TopicCheck`](crate::models::TopicCheck) | empty |
//! | Category-check log | [`CategoryCheck`](crate::models::CategoryCheck) | empty |
//! | Crowd-sourcing results | [`CrowdSourcingRecord`] per `YYYYMMDD[_*].jsonl` | empty |
//!
//! Malformed lines are logged and skipped; one bad record never stops a run.

use crate::error::Result;
use crate::models::{CrowdSourcingBatch, CrowdSourcingRecord};
use crate::utils::{crowd_sourcing_timestamp, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

static BATCH_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(20\d{6})(?:_.*)?\.jsonl$").expect("valid regex"));

/// Parse every non-blank line of `text` as a `T`.
pub fn parse_jsonl<T: DeserializeOwned>(text: &str, source: &str) -> Vec<T> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| match serde_json::from_str(line.trim()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    source,
                    line = i + 1,
                    error = %e,
                    preview = %truncate_for_log(line, 120),
                    "Skipping malformed record"
                );
                None
            }
        })
        .collect()
}

/// Read a JSON-lines file. A missing file is an error.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = fs::read_to_string(path).await?;
    let records = parse_jsonl(&text, &path.display().to_string());
    info!(count = records.len(), "Read feed");
    Ok(records)
}

/// Read a JSON-lines file, treating a missing file as empty.
pub async fn read_jsonl_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match read_jsonl(path).await {
        Err(crate::error::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Feed file absent; nothing to read");
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Load every crowd-sourcing batch under `dir`, oldest file name first.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn read_crowd_sourcing_batches(dir: &Path) -> Result<Vec<CrowdSourcingBatch>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No crowd-sourcing result directory");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(date) = BATCH_FILE.captures(&name).map(|c| c[1].to_string()) else {
            continue;
        };
        match crowd_sourcing_timestamp(&date) {
            Some(timestamp) => files.push((name, timestamp, entry.path())),
            None => warn!(file = %name, "Crowd-sourcing file name is not a valid date; skipping"),
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut batches = Vec::with_capacity(files.len());
    for (name, timestamp, path) in files {
        let records: Vec<CrowdSourcingRecord> = read_jsonl(&path).await?;
        debug!(file = %name, records = records.len(), %timestamp, "Loaded crowd-sourcing batch");
        batches.push(CrowdSourcingBatch { timestamp, records });
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryCheck;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("covid_news_index-feeds-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_jsonl_skips_malformed_and_blank_lines() {
        let text = r#"{"url": "a", "new_country": "jp", "new_topics": []}

not json
{"url": "b", "new_country": "us", "new_topics": ["その他"]}
"#;
        let records: Vec<CategoryCheck> = parse_jsonl(text, "test");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].new_topics, vec!["その他"]);
    }

    #[tokio::test]
    async fn test_missing_file_handling() {
        let path = std::env::temp_dir().join("covid_news_index-definitely-missing.jsonl");
        assert!(read_jsonl::<CategoryCheck>(&path).await.is_err());
        assert!(read_jsonl_if_exists::<CategoryCheck>(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crowd_sourcing_batches_sorted_by_date() {
        let dir = temp_dir("batches");
        let record = r#"{"url": "u", "tags": {"is_about_COVID-19": 1, "is_useful": 1, "is_clear": 1, "is_about_false_rumor": 0, "topics": {"その他": true}}}"#;
        std::fs::write(dir.join("20200502_round2.jsonl"), record).unwrap();
        std::fs::write(dir.join("20200415.jsonl"), format!("{record}\n{record}\n")).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.join("20201399.jsonl"), record).unwrap();

        let batches = read_crowd_sourcing_batches(&dir).await.unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].timestamp, "2020-04-15T00:00:00.000000");
        assert_eq!(batches[0].records.len(), 2);
        assert_eq!(batches[1].timestamp, "2020-05-02T00:00:00.000000");
        assert_eq!(batches[1].records[0].tags.selected_topics(), vec!["その他"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_batch_dir_is_empty() {
        let dir = std::env::temp_dir().join("covid_news_index-no-such-dir");
        assert!(read_crowd_sourcing_batches(&dir).await.unwrap().is_empty());
    }
}
