//! SQLite-backed attendee store via `tokio-rusqlite`.

use crate::Directory;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("invalid profile record: {0}")]
    InvalidProfile(String),
}

/// An attendee record as the display layer consumes it. The typed
/// columns are the fields the profile card renders directly; the full
/// source record rides along as JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeProfile {
    pub public_identifier: String,
    pub full_name: String,
    pub headline: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    pub profile_pic: Option<String>,
    pub location: Option<String>,
    pub about: Option<String>,
    /// Full source record, JSON-encoded.
    pub raw_profile: String,
}

/// Result of a bulk ingest.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IngestReport {
    pub inserted: u64,
    /// Duplicates by public identifier, left untouched.
    pub skipped: u64,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS attendees (
    public_identifier TEXT PRIMARY KEY,
    full_name         TEXT NOT NULL,
    headline          TEXT,
    job_title         TEXT,
    company_name      TEXT,
    email             TEXT,
    linkedin_url      TEXT,
    profile_pic       TEXT,
    location          TEXT,
    about             TEXT,
    raw_profile       TEXT NOT NULL
);
";

/// Attendee directory on a local SQLite database.
#[derive(Clone)]
pub struct SqliteDirectory {
    conn: Connection,
}

impl SqliteDirectory {
    /// Open (creating if needed) the database at `path` and ensure the
    /// schema exists.
    pub async fn open(path: &Path) -> Result<Self, DirectoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DirectoryError::InvalidProfile(format!("data dir: {e}")))?;
        }
        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    /// In-memory database, for tests.
    pub async fn open_in_memory() -> Result<Self, DirectoryError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, DirectoryError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Delete every attendee row. Returns the number removed.
    pub async fn clear(&self) -> Result<u64, DirectoryError> {
        let deleted = self
            .conn
            .call(|conn| Ok(conn.execute("DELETE FROM attendees", [])?))
            .await?;
        Ok(deleted as u64)
    }
}

impl Directory for SqliteDirectory {
    fn find(
        &self,
        public_id: &str,
    ) -> impl Future<Output = Result<Option<AttendeeProfile>, DirectoryError>> + Send {
        let conn = self.conn.clone();
        let public_id = public_id.to_string();
        async move {
            let profile = conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT public_identifier, full_name, headline, job_title,
                                    company_name, email, linkedin_url, profile_pic,
                                    location, about, raw_profile
                             FROM attendees WHERE public_identifier = ?1",
                            params![public_id],
                            |row| {
                                Ok(AttendeeProfile {
                                    public_identifier: row.get(0)?,
                                    full_name: row.get(1)?,
                                    headline: row.get(2)?,
                                    job_title: row.get(3)?,
                                    company_name: row.get(4)?,
                                    email: row.get(5)?,
                                    linkedin_url: row.get(6)?,
                                    profile_pic: row.get(7)?,
                                    location: row.get(8)?,
                                    about: row.get(9)?,
                                    raw_profile: row.get(10)?,
                                })
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;
            Ok(profile)
        }
    }

    fn count(&self) -> impl Future<Output = Result<u64, DirectoryError>> + Send {
        let conn = self.conn.clone();
        async move {
            let n: i64 = conn
                .call(|conn| {
                    Ok(conn.query_row("SELECT COUNT(*) FROM attendees", [], |row| row.get(0))?)
                })
                .await?;
            Ok(n as u64)
        }
    }

    fn ingest(
        &self,
        profiles: Vec<Value>,
    ) -> impl Future<Output = Result<IngestReport, DirectoryError>> + Send {
        let conn = self.conn.clone();
        async move {
            // Validate the whole batch up front; a single malformed
            // record rejects the upload, matching the bulk-upload page.
            let rows = profiles
                .iter()
                .map(parse_profile)
                .collect::<Result<Vec<_>, _>>()?;

            let report = conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let mut inserted = 0u64;
                    let mut skipped = 0u64;
                    for p in &rows {
                        let changed = tx.execute(
                            "INSERT OR IGNORE INTO attendees
                             (public_identifier, full_name, headline, job_title,
                              company_name, email, linkedin_url, profile_pic,
                              location, about, raw_profile)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                            params![
                                p.public_identifier,
                                p.full_name,
                                p.headline,
                                p.job_title,
                                p.company_name,
                                p.email,
                                p.linkedin_url,
                                p.profile_pic,
                                p.location,
                                p.about,
                                p.raw_profile,
                            ],
                        )?;
                        if changed == 0 {
                            skipped += 1;
                        } else {
                            inserted += 1;
                        }
                    }
                    tx.commit()?;
                    Ok(IngestReport { inserted, skipped })
                })
                .await?;

            tracing::info!(
                inserted = report.inserted,
                skipped = report.skipped,
                "attendee ingest complete"
            );
            Ok(report)
        }
    }
}

fn opt_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Extract the typed columns from a raw profile record. Each record
/// must carry a public identifier and a full name.
fn parse_profile(value: &Value) -> Result<AttendeeProfile, DirectoryError> {
    let public_identifier = opt_str(value, "publicIdentifier")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DirectoryError::InvalidProfile("missing publicIdentifier".into()))?;
    let full_name = opt_str(value, "fullName")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            DirectoryError::InvalidProfile(format!("{public_identifier}: missing fullName"))
        })?;

    Ok(AttendeeProfile {
        public_identifier,
        full_name,
        headline: opt_str(value, "headline"),
        job_title: opt_str(value, "jobTitle"),
        company_name: opt_str(value, "companyName"),
        email: opt_str(value, "email"),
        linkedin_url: opt_str(value, "linkedinUrl"),
        profile_pic: opt_str(value, "profilePicHighQuality").or_else(|| opt_str(value, "profilePic")),
        location: opt_str(value, "addressWithCountry"),
        about: opt_str(value, "about"),
        raw_profile: value.to_string(),
    })
}
