//! dex-matcher — Client for the remote face-recognition service.
//!
//! The service is a black box: it takes one encoded still image and
//! returns either a matched identity with a confidence score plus a
//! ranked candidate list, or no match. This crate speaks its HTTP/JSON
//! protocol and maps failures into the taxonomy the orchestrator
//! distinguishes.

pub mod client;

use dex_core::MatchOutcome;
use std::future::Future;

pub use client::{HealthInfo, HttpMatcher, LoadStats, MatcherError};

/// Seam between the orchestrator and the recognition service, so the
/// engine can be exercised against scripted fakes.
pub trait FaceMatcher: Send + Sync + 'static {
    /// Submit one encoded still image for matching.
    fn match_face(
        &self,
        image: Vec<u8>,
    ) -> impl Future<Output = Result<MatchOutcome, MatcherError>> + Send;

    /// Push profile records to the service so it can precompute
    /// embeddings.
    fn load_profiles(
        &self,
        profiles: Vec<serde_json::Value>,
    ) -> impl Future<Output = Result<LoadStats, MatcherError>> + Send;
}
