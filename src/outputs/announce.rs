//! Queue of newly inserted pages for an external poster to announce.

use super::append_json_line;
use crate::error::Result;
use crate::models::Page;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// What the poster needs to compose a message about one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub url: String,
    pub country: String,
    /// Japanese title.
    pub title: String,
    pub orig_title: String,
    pub timestamp: String,
}

impl From<&Page> for Announcement {
    fn from(page: &Page) -> Self {
        Self {
            url: page.url.clone(),
            country: page.displayed_country.clone(),
            title: page.ja_translated.title.clone(),
            orig_title: page.orig.title.clone(),
            timestamp: page.orig.timestamp.clone(),
        }
    }
}

/// Pick one candidate uniformly at random.
pub fn pick(candidates: &[Page]) -> Option<Announcement> {
    candidates.choose(&mut rand::rng()).map(Announcement::from)
}

/// Append one random candidate to the queue at `path`.
///
/// Returns the queued announcement, or `None` when there were no candidates.
#[instrument(level = "info", skip_all, fields(path = %path.display(), candidates = candidates.len()))]
pub async fn enqueue(path: &Path, candidates: &[Page]) -> Result<Option<Announcement>> {
    let Some(announcement) = pick(candidates) else {
        debug!("No newly inserted useful page; nothing to announce");
        return Ok(None);
    };
    append_json_line(path, &announcement).await?;
    info!(url = %announcement.url, "Queued page for announcement");
    Ok(Some(announcement))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str) -> Page {
        let mut page = Page::partial(url);
        page.displayed_country = "jp".into();
        page.ja_translated.title = "感染者数が増加".into();
        page.orig.title = "Cases rise".into();
        page.orig.timestamp = "2020-05-01T00:00:00.000000".into();
        page
    }

    #[test]
    fn test_pick_from_candidates() {
        assert_eq!(pick(&[]), None);
        let candidates = vec![candidate("a"), candidate("b")];
        let picked = pick(&candidates).unwrap();
        assert!(picked.url == "a" || picked.url == "b");
        assert_eq!(picked.title, "感染者数が増加");
        assert_eq!(picked.country, "jp");
    }

    #[tokio::test]
    async fn test_enqueue_appends_one_line() {
        let path = std::env::temp_dir().join(format!("covid_news_index-announce-{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        assert_eq!(enqueue(&path, &[]).await.unwrap(), None);
        assert!(!path.exists());

        let queued = enqueue(&path, &[candidate("a")]).await.unwrap().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
        let read: Announcement = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(read, queued);
        let _ = std::fs::remove_file(&path);
    }
}
