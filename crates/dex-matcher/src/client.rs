//! reqwest-based recognition service client.

use crate::FaceMatcher;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dex_core::{Candidate, MatchOutcome, MatchedIdentity};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Raw error bodies kept for diagnostics are clipped to this length.
const MAX_ERROR_BODY: usize = 200;

#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("recognition service unreachable: {0}")]
    Unreachable(String),
    #[error("recognition service call timed out")]
    TimedOut,
    #[error("recognition service has no profiles loaded")]
    NoProfilesLoaded,
    #[error("recognition service error {status}: {body}")]
    Service { status: u16, body: String },
    #[error("invalid response from recognition service: {0}")]
    InvalidResponse(String),
}

/// Result of pushing profiles to the service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadStats {
    /// Profiles whose embedding was computed.
    pub computed: u64,
    /// Profiles skipped (no usable image, no face found).
    pub failed: u64,
    pub total: u64,
}

/// Service health snapshot.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthInfo {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub profiles_loaded: u64,
}

// --- Wire shapes (service JSON) ---

#[derive(Debug, Deserialize)]
struct MatchFaceResponse {
    /// Full profile object or null; only the public identifier matters
    /// here — resolution to a display profile happens against the
    /// attendee directory, never against this payload.
    matched_profile: Option<WireProfileRef>,
    confidence: Option<f32>,
    #[serde(default)]
    top_3_candidates: Vec<WireCandidate>,
    match_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProfileRef {
    public_identifier: String,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    name: String,
    confidence: f32,
}

/// HTTP client for the recognition service.
pub struct HttpMatcher {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMatcher {
    /// Build a client with an enforced per-call deadline. The upstream
    /// service is untimed; without this a hung call would block the
    /// kiosk's matching pipeline forever.
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `GET /health`.
    pub async fn health(&self) -> Result<HealthInfo, MatcherError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(classify_transport)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }
        resp.json()
            .await
            .map_err(|e| MatcherError::InvalidResponse(e.to_string()))
    }

    async fn match_face_inner(&self, image: Vec<u8>) -> Result<MatchOutcome, MatcherError> {
        // The service accepts the capture as a browser-style data URL.
        let image_data = format!("data:image/jpeg;base64,{}", BASE64.encode(&image));

        let started = Instant::now();
        let resp = self
            .http
            .post(format!("{}/match-face", self.base_url))
            .json(&serde_json::json!({ "imageData": image_data }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let wire: MatchFaceResponse = resp
            .json()
            .await
            .map_err(|e| MatcherError::InvalidResponse(e.to_string()))?;
        let elapsed = started.elapsed().as_secs_f64();

        interpret(wire, elapsed)
    }

    async fn load_profiles_inner(
        &self,
        profiles: Vec<serde_json::Value>,
    ) -> Result<LoadStats, MatcherError> {
        tracing::info!(count = profiles.len(), "pushing profiles to recognition service");
        let resp = self
            .http
            .post(format!("{}/load-profiles", self.base_url))
            .json(&serde_json::json!({ "profiles": profiles }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        resp.json()
            .await
            .map_err(|e| MatcherError::InvalidResponse(e.to_string()))
    }
}

impl FaceMatcher for HttpMatcher {
    fn match_face(
        &self,
        image: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<MatchOutcome, MatcherError>> + Send {
        self.match_face_inner(image)
    }

    fn load_profiles(
        &self,
        profiles: Vec<serde_json::Value>,
    ) -> impl std::future::Future<Output = Result<LoadStats, MatcherError>> + Send {
        self.load_profiles_inner(profiles)
    }
}

/// Map a transport-level reqwest failure into the orchestrator's
/// taxonomy. Connection failures are the "service not running" case.
fn classify_transport(err: reqwest::Error) -> MatcherError {
    if err.is_timeout() {
        MatcherError::TimedOut
    } else if err.is_connect() {
        MatcherError::Unreachable(err.to_string())
    } else {
        MatcherError::InvalidResponse(format!("transport: {err}"))
    }
}

/// Map a non-success HTTP status. A 400 naming the empty profile store
/// is a distinct operator-actionable condition; everything else keeps
/// its raw status and (clipped) body for the log.
fn classify_status(status: u16, body: &str) -> MatcherError {
    if status == 400 && body.contains("No profiles loaded") {
        MatcherError::NoProfilesLoaded
    } else {
        MatcherError::Service {
            status,
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        }
    }
}

/// Interpret a decoded wire response. A 200 with a null
/// `matched_profile` is a normal no-match answer, not an error.
fn interpret(wire: MatchFaceResponse, client_elapsed: f64) -> Result<MatchOutcome, MatcherError> {
    let matched = match wire.matched_profile {
        Some(profile) => {
            let confidence = wire.confidence.ok_or_else(|| {
                MatcherError::InvalidResponse("matched_profile without confidence".into())
            })?;
            Some(MatchedIdentity {
                public_id: profile.public_identifier,
                confidence,
            })
        }
        None => None,
    };

    let candidates = MatchOutcome::normalize_candidates(
        wire.top_3_candidates
            .into_iter()
            .map(|c| Candidate {
                name: c.name,
                confidence: c.confidence,
            })
            .collect(),
    );

    Ok(MatchOutcome {
        matched,
        candidates,
        // Prefer the service's own measurement when it reports one.
        elapsed_seconds: wire.match_time.unwrap_or(client_elapsed),
    })
}
