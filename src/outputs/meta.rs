//! Country metadata served at `/meta`, and the per-country source list.
//!
//! `meta.json` holds `{"countries": [{"country": code, ...}, ...]}`.
//! `stats.json` holds `{"last_updated": ..., "stats": {code: {...}}}` and
//! `sources.json` holds `{code: [url, ...]}`; both are merged into the
//! matching country entry at read time.

use crate::error::{Error, Result};
use crate::taxonomy::{ALL, COUNTRIES};
use crate::utils::ensure_parent_dir;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const META_FILE: &str = "meta.json";
pub const STATS_FILE: &str = "stats.json";
pub const SOURCES_FILE: &str = "sources.json";

/// The crawler's site list: every crawled domain with its region and hosts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteList {
    #[serde(default)]
    pub domains: IndexMap<String, DomainInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainInfo {
    pub region: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

async fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

async fn read_json_if_exists(path: &Path) -> Result<Option<Value>> {
    match read_json(path).await {
        Ok(value) => Ok(Some(value)),
        Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Optional metadata file absent");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Read `meta.json` from `dir` and merge in stats and sources when present.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn load_meta(dir: &Path) -> Result<Value> {
    let meta = read_json(&dir.join(META_FILE)).await?;
    let stats = read_json_if_exists(&dir.join(STATS_FILE)).await?;
    let sources = read_json_if_exists(&dir.join(SOURCES_FILE)).await?;
    merge_meta(meta, stats, sources)
}

/// Attach `stats.stats[code]` and `sources[code]` to each country of `meta`.
pub fn merge_meta(mut meta: Value, stats: Option<Value>, sources: Option<Value>) -> Result<Value> {
    let countries = meta
        .get_mut("countries")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| Error::Config(format!("{META_FILE} has no `countries` list")))?;

    let index: IndexMap<String, usize> = countries
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.get("country").and_then(Value::as_str).map(|code| (code.to_string(), i)))
        .collect();

    let per_country = [
        ("stats", stats.and_then(|mut s| s.get_mut("stats").map(Value::take))),
        ("sources", sources),
    ];
    for (field, values) in per_country {
        let Some(Value::Object(values)) = values else {
            continue;
        };
        for (code, value) in values {
            match index.get(&code) {
                Some(&i) => {
                    if let Some(country) = countries[i].as_object_mut() {
                        country.insert(field.to_string(), value);
                    }
                }
                None => warn!(field, country = %code, "No metadata entry for country; dropping"),
            }
        }
    }
    Ok(meta)
}

/// Map each country key (except `all`) to the `http://` URLs of the sources
/// whose domain region is one of the key's labels. Keys without sources are
/// left out.
pub fn build_sources(site_list: &SiteList) -> IndexMap<String, Vec<String>> {
    let mut sources = IndexMap::new();
    for (key, regions) in COUNTRIES.entries() {
        if key == ALL {
            continue;
        }
        let urls: Vec<String> = site_list
            .domains
            .iter()
            .filter(|(_, info)| regions.iter().any(|region| *region == info.region))
            .flat_map(|(domain, info)| {
                info.sources.iter().filter_map(move |source| {
                    let candidate = format!("http://{source}");
                    match Url::parse(&candidate) {
                        Ok(_) => Some(candidate),
                        Err(e) => {
                            warn!(%domain, %source, error = %e, "Skipping invalid source host");
                            None
                        }
                    }
                })
            })
            .collect();
        if !urls.is_empty() {
            sources.insert(key.to_string(), urls);
        }
    }
    sources
}

/// Read the site list at `site_list_path` and write `sources.json` into `meta_dir`.
#[instrument(level = "info", skip_all, fields(site_list = %site_list_path.display()))]
pub async fn write_sources(site_list_path: &Path, meta_dir: &Path) -> Result<IndexMap<String, Vec<String>>> {
    let text = fs::read_to_string(site_list_path).await?;
    let site_list: SiteList = serde_json::from_str(&text)?;
    let sources = build_sources(&site_list);

    let out = meta_dir.join(SOURCES_FILE);
    ensure_parent_dir(&out).await?;
    fs::write(&out, serde_json::to_string_pretty(&sources)?).await?;
    info!(path = %out.display(), countries = sources.len(), "Wrote sources");
    Ok(sources)
}
