//! SQLite-backed [`PageStore`].
//!
//! Each page is one row keyed by URL. The full page is kept as a JSON body;
//! the columns that listings filter and sort on are duplicated next to it and
//! rewritten by every statement that changes the body.
//!
//! All SQLite work runs on tokio's blocking pool. Writes go through a single
//! writer connection, so each write is one statement or one transaction.
//! Reads check out a pooled connection of their own and never wait for the
//! writer (WAL mode).

use super::{PageQuery, PageStore, PageUpdate, UpdateResult};
use crate::error::{Error, Result};
use crate::models::Page;
use crate::visibility::RELEVANCE_FILTERED_COUNTRY;
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task;
use tracing::{debug, info, instrument};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pages (
        url                  TEXT PRIMARY KEY,
        orig_timestamp       TEXT NOT NULL,
        country              TEXT NOT NULL DEFAULT '',
        is_checked           INTEGER NOT NULL DEFAULT 0,
        is_about_covid_19    INTEGER NOT NULL DEFAULT 0,
        is_useful            INTEGER NOT NULL DEFAULT -1,
        is_about_false_rumor INTEGER NOT NULL DEFAULT 0,
        body                 TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_pages_timestamp ON pages(orig_timestamp);
    CREATE INDEX IF NOT EXISTS idx_pages_checked ON pages(is_checked, orig_timestamp);
    CREATE INDEX IF NOT EXISTS idx_pages_country ON pages(country, orig_timestamp);
";

// Every write statement binds the same eight parameters, see `write_page`.
const INSERT_PAGE: &str = "
    INSERT OR IGNORE INTO pages
        (url, orig_timestamp, country, is_checked, is_about_covid_19, is_useful, is_about_false_rumor, body)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const REPLACE_IF_NEWER: &str = "
    UPDATE pages SET orig_timestamp = ?2, country = ?3, is_checked = ?4, is_about_covid_19 = ?5,
        is_useful = ?6, is_about_false_rumor = ?7, body = ?8
    WHERE url = ?1 AND orig_timestamp < ?2";

const UPDATE_PAGE: &str = "
    UPDATE pages SET orig_timestamp = ?2, country = ?3, is_checked = ?4, is_about_covid_19 = ?5,
        is_useful = ?6, is_about_false_rumor = ?7, body = ?8
    WHERE url = ?1";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn poisoned() -> Error {
    Error::Store("SQLite connection mutex poisoned".into())
}

fn write_page(conn: &Connection, sql: &str, page: &Page) -> Result<usize> {
    let body = serde_json::to_string(page)?;
    Ok(conn.execute(
        sql,
        params![
            page.url,
            page.orig.timestamp,
            page.country,
            page.is_checked,
            page.is_about_covid_19,
            page.is_useful,
            page.is_about_false_rumor,
            body
        ],
    )?)
}

fn select_body(conn: &Connection, url: &str) -> Result<Option<Page>> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM pages WHERE url = ?1", params![url], |row| row.get(0))
        .optional()?;
    Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Translate a [`PageQuery`] into a `WHERE` clause and its bound values.
///
/// Mirrors [`PageQuery::matches`]; an empty label set matches nothing.
fn where_clause(query: &PageQuery) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if query.checked_only {
        clauses.push("is_checked = 1".into());
    }
    if let Some(visibility) = &query.visibility {
        clauses.push("(country <> ? OR is_about_covid_19 = 1)".into());
        values.push(Value::Text(RELEVANCE_FILTERED_COUNTRY.to_string()));
        clauses.push("(is_checked = 0 OR is_useful <> 0 OR is_about_false_rumor = 1)".into());
        clauses.push("(is_checked = 1 OR orig_timestamp > ?)".into());
        values.push(Value::Text(visibility.cutoff.clone()));
    }
    if let Some(topics) = query.topics {
        if topics.is_empty() {
            clauses.push("0".into());
        } else {
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM json_each(pages.body, '$.topics') AS t WHERE t.value IN ({}))",
                placeholders(topics.len())
            ));
            values.extend(topics.iter().map(|t| Value::Text(t.to_string())));
        }
    }
    if let Some(countries) = query.countries {
        if countries.is_empty() {
            clauses.push("0".into());
        } else {
            clauses.push(format!("country IN ({})", placeholders(countries.len())));
            values.extend(countries.iter().map(|c| Value::Text(c.to_string())));
        }
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

/// Writer connection plus a pool of idle reader connections to the same database.
#[derive(Debug)]
struct Shared {
    target: String,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
}

impl Shared {
    fn checkout(&self) -> Result<Connection> {
        if let Some(conn) = self.readers.lock().map_err(|_| poisoned())?.pop() {
            return Ok(conn);
        }
        debug!(database = %self.target, "Opening reader connection");
        let conn = Connection::open_with_flags(
            &self.target,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA query_only = 1;")?;
        Ok(conn)
    }

    fn checkin(&self, conn: Connection) {
        if let Ok(mut idle) = self.readers.lock() {
            idle.push(conn);
        }
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer.lock().map_err(|_| poisoned())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    shared: Arc<Shared>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened SQLite page store");
        Self::with_writer(path.to_string_lossy().into_owned(), conn)
    }

    /// A private in-memory database shared by this store's connections.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static NEXT: AtomicUsize = AtomicUsize::new(0);

        let target = format!(
            "file:covid_news_index-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        );
        let conn = Connection::open_with_flags(
            &target,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Self::with_writer(target, conn)
    }

    fn with_writer(target: String, conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            shared: Arc::new(Shared {
                target,
                writer: Mutex::new(conn),
                readers: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Run `f` on a pooled reader connection on the blocking pool.
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        task::spawn_blocking(move || {
            let conn = shared.checkout()?;
            let result = f(&conn);
            shared.checkin(conn);
            result
        })
        .await
        .map_err(Error::store)?
    }

    /// Run `f` on the writer connection on the blocking pool.
    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        task::spawn_blocking(move || {
            let mut conn = shared.writer()?;
            f(&mut *conn)
        })
        .await
        .map_err(Error::store)?
    }
}

#[async_trait]
impl PageStore for SqliteStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<Page>> {
        let url = url.to_string();
        self.read(move |conn| select_body(conn, &url)).await
    }

    async fn find(&self, query: &PageQuery, skip: usize, limit: usize) -> Result<Vec<Page>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let (filter, mut values) = where_clause(query);
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        values.push(Value::Integer(i64::try_from(skip).unwrap_or(i64::MAX)));
        let sql = format!("SELECT body FROM pages{filter} ORDER BY orig_timestamp DESC, rowid ASC LIMIT ? OFFSET ?");

        self.read(move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| row.get::<_, String>(0))?;
            let mut pages = Vec::new();
            for body in rows {
                pages.push(serde_json::from_str(&body?)?);
            }
            Ok(pages)
        })
        .await
    }

    async fn count(&self, query: &PageQuery) -> Result<usize> {
        let (filter, values) = where_clause(query);
        let sql = format!("SELECT COUNT(*) FROM pages{filter}");
        self.read(move |conn| {
            let n: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
            usize::try_from(n).map_err(Error::store)
        })
        .await
    }

    async fn insert(&self, page: Page) -> Result<bool> {
        self.write(move |conn| Ok(write_page(conn, INSERT_PAGE, &page)? == 1)).await
    }

    async fn replace_if_newer(&self, page: Page) -> Result<bool> {
        self.write(move |conn| Ok(write_page(conn, REPLACE_IF_NEWER, &page)? == 1)).await
    }

    async fn update_by_url(&self, url: &str, update: &PageUpdate, upsert: bool) -> Result<UpdateResult> {
        let url = url.to_string();
        let update = update.clone();
        self.write(move |conn| {
            let tx = conn.transaction()?;
            let result = match select_body(&tx, &url)? {
                Some(mut page) => {
                    if !update.admits(&page) {
                        return Ok(UpdateResult::Stale);
                    }
                    update.apply(&mut page);
                    write_page(&tx, UPDATE_PAGE, &page)?;
                    UpdateResult::Updated
                }
                None if upsert => {
                    let mut page = Page::partial(&url);
                    update.apply(&mut page);
                    write_page(&tx, INSERT_PAGE, &page)?;
                    UpdateResult::Inserted
                }
                None => return Ok(UpdateResult::NotFound),
            };
            tx.commit()?;
            Ok(result)
        })
        .await
    }
}
