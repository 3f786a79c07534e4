//! Base predicates every listing must satisfy.
//!
//! A page is listed only if all three rules hold:
//! 1. **Relevance**: non-Japanese pages always pass; Japanese pages need
//!    `is_about_COVID-19 == 1`.
//! 2. **Moderation**: unreviewed, or reviewed and not rejected, or flagged as
//!    a notable false rumor.
//! 3. **Thinning exemption**: reviewed, or ingested after the crowd-sourcing
//!    cutoff (the newest reviewed page's timestamp).

use crate::error::Result;
use crate::models::Page;
use crate::store::{PageQuery, PageStore};
use tracing::{debug, instrument};

/// Cutoff used before any page has been reviewed.
pub const DEFAULT_CUTOFF: &str = "2020-01-01T00:00:00.000000";

/// Country whose pages are subject to the automatic relevance filter.
pub(crate) const RELEVANCE_FILTERED_COUNTRY: &str = "jp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    pub cutoff: String,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::with_cutoff(DEFAULT_CUTOFF)
    }
}

impl Visibility {
    pub fn with_cutoff(cutoff: impl Into<String>) -> Self {
        Self { cutoff: cutoff.into() }
    }

    /// Compute the cutoff from the current contents of `store`.
    #[instrument(level = "debug", skip_all)]
    pub async fn current<S: PageStore + ?Sized>(store: &S) -> Result<Self> {
        let latest = store.find(&PageQuery::checked(), 0, 1).await?;
        let visibility = match latest.first() {
            Some(page) => Self::with_cutoff(page.timestamp()),
            None => Self::default(),
        };
        debug!(cutoff = %visibility.cutoff, "Computed crowd-sourcing cutoff");
        Ok(visibility)
    }

    pub fn is_relevant(page: &Page) -> bool {
        page.country != RELEVANCE_FILTERED_COUNTRY || page.is_about_covid_19 == 1
    }

    pub fn passes_moderation(page: &Page) -> bool {
        page.is_checked == 0 || page.is_useful != 0 || page.is_about_false_rumor == 1
    }

    pub fn passes_thinning(&self, page: &Page) -> bool {
        page.is_checked == 1 || page.timestamp() > self.cutoff.as_str()
    }

    pub fn admits(&self, page: &Page) -> bool {
        Self::is_relevant(page) && Self::passes_moderation(page) && self.passes_thinning(page)
    }
}
