//! dex-directory — Attendee profile store.
//!
//! A key-value directory of attendee records keyed by their stable
//! public identifier. The orchestrator resolves a matched identity
//! here; the ingest path is the bulk-upload plumbing that fills it.

pub mod store;

use serde_json::Value;
use std::future::Future;

pub use store::{AttendeeProfile, DirectoryError, IngestReport, SqliteDirectory};

/// Seam between the orchestrator and the attendee store, so engine
/// tests can script directory hits and misses.
pub trait Directory: Send + Sync + 'static {
    /// Resolve a public identifier to a full profile. Pure lookup.
    fn find(
        &self,
        public_id: &str,
    ) -> impl Future<Output = Result<Option<AttendeeProfile>, DirectoryError>> + Send;

    fn count(&self) -> impl Future<Output = Result<u64, DirectoryError>> + Send;

    /// Bulk-insert profile records, skipping duplicates by public
    /// identifier.
    fn ingest(
        &self,
        profiles: Vec<Value>,
    ) -> impl Future<Output = Result<IngestReport, DirectoryError>> + Send;
}
