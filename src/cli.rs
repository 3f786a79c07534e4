//! Command-line interface definitions for the COVID-19 news index.
//!
//! The binary runs either the read API (`serve`) or one of the batch jobs
//! that refresh the page store and the metadata files. Global options can
//! also come from environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Serve the API with settings from a config file
/// covid_news_index -c config.yaml serve
///
/// # Refresh the database and queue one new page for announcement
/// covid_news_index -c config.yaml update-database --announce
///
/// # Record a manual category correction
/// covid_news_index correct --url https://example.com/a --country jp --topic 感染状況
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, env = "COVID_NEWS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file; overrides `database.path` from the config
    #[arg(long, env = "COVID_NEWS_DB", global = true)]
    pub sqlite: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Serve the read API
    Serve {
        /// Bind host; overrides `server.host`
        #[arg(long)]
        host: Option<String>,
        /// Bind port; overrides `server.port`
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ingest classified pages and replay manual and crowd-sourced corrections
    UpdateDatabase {
        /// Queue one newly inserted useful page for announcement
        #[arg(long)]
        announce: bool,
    },
    /// Rebuild sources.json from the site list
    UpdateSources,
    /// Run update-database followed by update-sources
    UpdateAll {
        #[arg(long)]
        announce: bool,
    },
    /// Apply one category correction and record it in the audit log
    Correct {
        #[arg(long)]
        url: String,
        /// Country shown for the page
        #[arg(long)]
        country: String,
        /// Topic to assign; repeat for several
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
}
