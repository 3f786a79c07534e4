//! Utility functions for logging, crowd-sourcing dates and file system checks.

use crate::error::Result;
use chrono::NaiveDate;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut after `max` characters with an ellipsis and a count
/// of the bytes left out appended. Cuts always land on a character boundary.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Turn a crowd-sourcing run date (`YYYYMMDD`) into the start-of-day
/// timestamp used to compare against page timestamps.
///
/// Returns `None` for anything that is not a real calendar date.
pub fn crowd_sourcing_timestamp(date: &str) -> Option<String> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;
    Some(date.format("%Y-%m-%dT00:00:00.000000").to_string())
}

/// Ensure the directory that will hold `path` exists.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
        debug!(dir = %parent.display(), "Ensured parent directory");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "感染状況".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with("感染状…"));
        assert!(result.ends_with(&format!("(+{} bytes)", s.len() - 9)));
    }

    #[test]
    fn test_crowd_sourcing_timestamp() {
        assert_eq!(
            crowd_sourcing_timestamp("20200415").as_deref(),
            Some("2020-04-15T00:00:00.000000")
        );
        assert_eq!(crowd_sourcing_timestamp("20201332"), None);
        assert_eq!(crowd_sourcing_timestamp("2020041"), None);
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_creates_missing_dirs() {
        let dir = std::env::temp_dir().join(format!("covid_news_index-parent-{}", std::process::id()));
        let file = dir.join("nested").join("log.jsonl");
        ensure_parent_dir(&file).await.unwrap();
        assert!(file.parent().unwrap().is_dir());
        let _ = std::fs::remove_dir_all(&dir);
        ensure_parent_dir(Path::new("bare-file.jsonl")).await.unwrap();
    }
}
