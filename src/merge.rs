//! Insert-or-update of pages and application of manual corrections.
//!
//! The stored `orig.timestamp` of a URL only ever moves forward: raw
//! ingestion replaces a page through the store's conditional
//! [`PageStore::replace_if_newer`], and crowd-sourcing results are applied
//! with an older-than guard.

use crate::error::Result;
use crate::models::{CategoryCheck, CrowdSourcingBatch, Page, RawPage, TopicCheck};
use crate::normalize::normalize;
use crate::outputs::audit::AuditLog;
use crate::store::{PageStore, PageUpdate, SnippetUpdate, UpdateResult};
use tracing::{debug, info, instrument, warn};

/// Which branch an upsert took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStatus {
    Inserted,
    Updated,
    /// Stored version is as new or newer.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub status: UpsertStatus,
    /// The page as normalized from the incoming record.
    pub page: Page,
    /// The classifier scored the record useful. Only used to pick announcements.
    pub auto_useful: bool,
}

/// What a correction-log entry did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionOutcome {
    Updated,
    /// No page had this URL; a partial page holding only the correction was created.
    CreatedPartial,
}

/// Counters for one crowd-sourcing replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub stale: usize,
    pub missing: usize,
}

/// Normalize `raw` and merge it into `store`.
///
/// Returns `None` when the normalizer rejects the record. A newer record
/// replaces the stored page entirely, including its moderation state.
#[instrument(level = "debug", skip_all, fields(url = %raw.url))]
pub async fn upsert<S: PageStore + ?Sized>(store: &S, raw: &RawPage) -> Result<Option<UpsertOutcome>> {
    let Some(page) = normalize(raw) else {
        return Ok(None);
    };
    let auto_useful = raw.classes.is_useful == 1;

    let status = match store.find_by_url(&page.url).await? {
        None => {
            if store.insert(page.clone()).await? {
                UpsertStatus::Inserted
            } else {
                // Lost an insert race; fall through to the conditional replace.
                replace(store, &page).await?
            }
        }
        Some(existing) if page.timestamp() > existing.timestamp() => replace(store, &page).await?,
        Some(_) => UpsertStatus::Unchanged,
    };

    match status {
        UpsertStatus::Unchanged => debug!(timestamp = %page.timestamp(), "Stale record; stored page kept"),
        _ => debug!(?status, timestamp = %page.timestamp(), "Page merged"),
    }
    Ok(Some(UpsertOutcome {
        status,
        page,
        auto_useful,
    }))
}

async fn replace<S: PageStore + ?Sized>(store: &S, page: &Page) -> Result<UpsertStatus> {
    Ok(if store.replace_if_newer(page.clone()).await? {
        UpsertStatus::Updated
    } else {
        UpsertStatus::Unchanged
    })
}

/// Apply a reviewer's topic check to an existing page. Unknown URLs are ignored.
#[instrument(level = "debug", skip_all, fields(url = %check.url))]
pub async fn apply_manual_topic_check<S: PageStore + ?Sized>(store: &S, check: &TopicCheck) -> Result<bool> {
    let update = PageUpdate {
        displayed_country: Some(check.new_country.clone()),
        topics: Some(check.selected_topics()),
        snippets: SnippetUpdate::RetainTopics,
        is_checked: Some(1),
        is_about_covid_19: Some(check.is_about_covid_19),
        is_useful: Some(check.is_useful),
        is_clear: check.is_clear,
        is_about_false_rumor: Some(check.is_about_false_rumor),
        is_hidden: Some(check.is_hidden),
        older_than: None,
    };
    let result = store.update_by_url(&check.url, &update, false).await?;
    if result == UpdateResult::NotFound {
        debug!("Topic check for unknown page ignored");
    }
    Ok(result == UpdateResult::Updated)
}

fn category_update(check: &CategoryCheck) -> PageUpdate {
    PageUpdate {
        displayed_country: Some(check.new_country.clone()),
        topics: Some(check.new_topics.clone()),
        ..Default::default()
    }
}

/// Correct a page's displayed country and topics, and record the correction
/// in the audit log.
///
/// A URL with no stored page still gets a (partial) page; this is logged as
/// an anomaly rather than rejected.
#[instrument(level = "info", skip_all, fields(url = %check.url))]
pub async fn apply_correction_log<S: PageStore + ?Sized>(
    store: &S,
    check: &CategoryCheck,
    audit: &AuditLog,
) -> Result<CorrectionOutcome> {
    let outcome = match store.update_by_url(&check.url, &category_update(check), true).await? {
        UpdateResult::Inserted => {
            warn!("Correction for unknown URL created a partial page");
            CorrectionOutcome::CreatedPartial
        }
        _ => CorrectionOutcome::Updated,
    };
    audit.append(check).await?;
    info!(new_country = %check.new_country, topics = check.new_topics.len(), "Applied correction");
    Ok(outcome)
}

/// Re-apply audited corrections to pages that exist. Returns how many matched.
#[instrument(level = "info", skip_all)]
pub async fn replay_category_check_log<S: PageStore + ?Sized>(store: &S, checks: &[CategoryCheck]) -> Result<usize> {
    let mut applied = 0;
    for check in checks {
        if store.update_by_url(&check.url, &category_update(check), false).await? == UpdateResult::Updated {
            applied += 1;
        }
    }
    info!(applied, total = checks.len(), "Replayed category-check log");
    Ok(applied)
}

/// Apply crowd-sourcing batches. A record only applies when its batch is
/// strictly newer than the page it targets.
#[instrument(level = "info", skip_all)]
pub async fn apply_crowd_sourcing_results<S: PageStore + ?Sized>(
    store: &S,
    batches: &[CrowdSourcingBatch],
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for batch in batches {
        for record in &batch.records {
            let tags = &record.tags;
            let update = PageUpdate {
                topics: Some(tags.selected_topics()),
                snippets: SnippetUpdate::RetainTopics,
                is_checked: Some(1),
                is_about_covid_19: Some(tags.is_about_covid_19),
                is_useful: Some(tags.is_useful),
                is_clear: Some(tags.is_clear),
                is_about_false_rumor: Some(tags.is_about_false_rumor),
                older_than: Some(batch.timestamp.clone()),
                ..Default::default()
            };
            match store.update_by_url(&record.url, &update, false).await? {
                UpdateResult::Updated => summary.applied += 1,
                UpdateResult::Stale => {
                    debug!(url = %record.url, batch = %batch.timestamp, "Stale crowd-sourcing result skipped");
                    summary.stale += 1;
                }
                UpdateResult::NotFound | UpdateResult::Inserted => summary.missing += 1,
            }
        }
    }
    info!(
        batches = batches.len(),
        applied = summary.applied,
        stale = summary.stale,
        missing = summary.missing,
        "Applied crowd-sourcing results"
    );
    Ok(summary)
}
