//! # COVID-19 News Index
//!
//! Classifies news pages about COVID-19 by topic and country, merges manual
//! and crowd-sourced corrections into a page store, and serves filtered,
//! paginated listings over HTTP.
//!
//! ## Usage
//!
//! ```sh
//! covid_news_index -c config.yaml update-all --announce
//! covid_news_index -c config.yaml serve
//! ```
//!
//! ## Architecture
//!
//! 1. **Feeds**: read the classifier's article list and the correction logs
//! 2. **Merge**: normalize and upsert pages; apply corrections under the
//!    timestamp-monotonic rules of the store
//! 3. **Query**: list visible pages along the topic and country taxonomies
//! 4. **Outputs**: audit log, announcement queue, country metadata

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod feeds;
mod jobs;
mod merge;
mod models;
mod normalize;
mod outputs;
mod query;
mod store;
mod taxonomy;
mod utils;
mod visibility;

use cli::{Cli, Command};
use config::AppConfig;
use models::CategoryCheck;
use store::PageStore;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("covid_news_index starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.sqlite, ?args.command, "Parsed CLI arguments");

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(path) = args.sqlite {
        config.database.path = Some(path);
    }

    match args.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config, config.open_store()?).await?;
        }
        Command::UpdateDatabase { announce } => {
            let store = config.open_store()?;
            let report = jobs::update_database(store.as_ref(), &config, announce).await?;
            info!(?report, "Database updated");
        }
        Command::UpdateSources => {
            let countries = jobs::update_sources(&config).await?;
            info!(countries, "Sources updated");
        }
        Command::UpdateAll { announce } => {
            let store = config.open_store()?;
            let report = jobs::update_database(store.as_ref(), &config, announce).await?;
            info!(?report, "Database updated");
            let countries = jobs::update_sources(&config).await?;
            info!(countries, "Sources updated");
        }
        Command::Correct { url, country, topics } => {
            let store = config.open_store()?;
            let check = CategoryCheck {
                url,
                new_country: country,
                new_topics: topics,
            };
            let outcome = jobs::correct(store.as_ref(), &config, &check).await?;
            info!(?outcome, url = %check.url, "Correction recorded");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

async fn serve(config: &AppConfig, store: Arc<dyn PageStore>) -> Result<(), Box<dyn Error>> {
    let state = api::AppState {
        store,
        meta_dir: config.data.meta_dir.clone(),
    };
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Serving read API");
    axum::serve(listener, api::router(state)).await?;
    Ok(())
}
