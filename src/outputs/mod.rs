//! File outputs written alongside the page store.
//!
//! # Submodules
//!
//! - [`audit`]: Append-only log of manual category corrections
//! - [`meta`]: Per-country metadata merged for the `/meta` endpoint, and the
//!   per-country source list derived from the crawler's site list
//! - [`announce`]: Queue of freshly inserted pages to announce
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── category_check_log.jsonl   # audit
//! ├── announce_queue.jsonl       # announce
//! └── meta/
//!     ├── meta.json
//!     ├── stats.json
//!     └── sources.json           # meta::write_sources
//! ```

pub mod announce;
pub mod audit;
pub mod meta;

use crate::error::Result;
use crate::utils::ensure_parent_dir;
use serde::Serialize;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Append `record` to `path` as one JSON line, creating the file if needed.
///
/// Non-ASCII text is written as-is.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn append_json_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    ensure_parent_dir(path).await?;
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    debug!(bytes = line.len(), "Appended JSON line");
    Ok(())
}
