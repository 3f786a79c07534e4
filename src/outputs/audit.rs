//! Append-only audit log of manual category corrections.

use super::append_json_line;
use crate::error::Result;
use crate::feeds::read_jsonl_if_exists;
use crate::models::CategoryCheck;
use std::path::PathBuf;
use tracing::{info, instrument};

/// One [`CategoryCheck`] per line, in the order they were applied.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[instrument(level = "info", skip_all, fields(url = %check.url))]
    pub async fn append(&self, check: &CategoryCheck) -> Result<()> {
        append_json_line(&self.path, check).await?;
        info!(path = %self.path.display(), "Recorded category correction");
        Ok(())
    }

    /// Every recorded correction, oldest first. A log that was never written
    /// reads as empty.
    pub async fn read_all(&self) -> Result<Vec<CategoryCheck>> {
        read_jsonl_if_exists(&self.path).await
    }
}
