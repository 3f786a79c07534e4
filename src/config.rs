//! YAML configuration for the batch jobs and the API server.
//!
//! Every section and field is optional; a missing file section falls back to
//! the defaults below, which match the layout of a fresh checkout:
//!
//! ```yaml
//! database:
//!   path: data/pages.sqlite3       # null keeps pages in memory
//! data:
//!   article_list: data/article_list.jsonl
//!   topic_check_log: data/topic_check_log.jsonl
//!   category_check_log: data/category_check_log.jsonl
//!   site_list: data/site_list.json
//!   meta_dir: data
//! crowdsourcing:
//!   result_dir: data/crowdsourcing
//! announce:
//!   queue_path: data/announce_queue.jsonl
//! server:
//!   host: 0.0.0.0
//!   port: 5000
//! ```

use crate::error::{Error, Result};
use crate::outputs::audit::AuditLog;
use crate::store::{MemoryStore, PageStore, SqliteStore};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub data: DataConfig,
    pub crowdsourcing: CrowdSourcingConfig,
    pub announce: AnnounceConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file. An explicit `null` keeps pages in memory for the life of
    /// the process.
    pub path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("data/pages.sqlite3")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub article_list: PathBuf,
    pub topic_check_log: PathBuf,
    pub category_check_log: PathBuf,
    pub site_list: PathBuf,
    pub meta_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            article_list: PathBuf::from("data/article_list.jsonl"),
            topic_check_log: PathBuf::from("data/topic_check_log.jsonl"),
            category_check_log: PathBuf::from("data/category_check_log.jsonl"),
            site_list: PathBuf::from("data/site_list.json"),
            meta_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrowdSourcingConfig {
    pub result_dir: PathBuf,
}

impl Default for CrowdSourcingConfig {
    fn default() -> Self {
        Self {
            result_dir: PathBuf::from("data/crowdsourcing"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    pub queue_path: PathBuf,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            queue_path: PathBuf::from("data/announce_queue.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl AppConfig {
    /// Parse a YAML document. An empty document yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from `path`, or use the defaults when no path was given.
    #[instrument(level = "info", skip_all)]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_yaml(&text)?;
        info!(config_path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Open the configured page store.
    pub fn open_store(&self) -> Result<Arc<dyn PageStore>> {
        match &self.database.path {
            Some(path) => Ok(Arc::new(SqliteStore::open(path)?)),
            None => {
                warn!("No database path configured; pages are kept in memory only");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }

    pub fn audit_log(&self) -> AuditLog {
        AuditLog::new(&self.data.category_check_log)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
