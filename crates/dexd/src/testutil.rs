//! Scripted collaborator fakes for engine and scheduler tests.

use dex_core::MatchOutcome;
use dex_directory::{AttendeeProfile, Directory, DirectoryError, IngestReport};
use dex_matcher::{FaceMatcher, LoadStats, MatcherError};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// One scripted answer from the fake matcher.
pub struct FakeReply {
    gate: Option<oneshot::Receiver<()>>,
    result: Option<Result<MatchOutcome, MatcherError>>,
    panic: bool,
}

impl FakeReply {
    /// Resolve immediately with `result`.
    pub fn ready(result: Result<MatchOutcome, MatcherError>) -> Self {
        Self {
            gate: None,
            result: Some(result),
            panic: false,
        }
    }

    /// Stay in flight until the returned sender fires, then resolve.
    pub fn gated(result: Result<MatchOutcome, MatcherError>) -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                gate: Some(rx),
                result: Some(result),
                panic: false,
            },
        )
    }

    /// Panic inside the call, exercising the fault path.
    pub fn panicking() -> Self {
        Self {
            gate: None,
            result: None,
            panic: true,
        }
    }
}

/// Matcher fake that pops one scripted reply per call and counts
/// invocations. Calls beyond the script resolve as plain no-match
/// responses so cadence tests can run it dry.
#[derive(Default)]
pub struct FakeMatcher {
    calls: AtomicUsize,
    replies: Mutex<VecDeque<FakeReply>>,
}

impl FakeMatcher {
    pub fn scripted(replies: Vec<FakeReply>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            replies: Mutex::new(replies.into()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceMatcher for FakeMatcher {
    fn match_face(
        &self,
        _image: Vec<u8>,
    ) -> impl Future<Output = Result<MatchOutcome, MatcherError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        async move {
            let Some(reply) = reply else {
                return Ok(MatchOutcome {
                    matched: None,
                    candidates: Vec::new(),
                    elapsed_seconds: 0.0,
                });
            };
            if let Some(gate) = reply.gate {
                let _ = gate.await;
            }
            if reply.panic {
                panic!("scripted matcher fault");
            }
            reply.result.expect("non-panicking reply must carry a result")
        }
    }

    fn load_profiles(
        &self,
        profiles: Vec<Value>,
    ) -> impl Future<Output = Result<LoadStats, MatcherError>> + Send {
        let n = profiles.len() as u64;
        async move {
            Ok(LoadStats {
                computed: n,
                failed: 0,
                total: n,
            })
        }
    }
}

/// In-memory attendee directory fake.
#[derive(Default)]
pub struct FakeDirectory {
    profiles: Mutex<HashMap<String, AttendeeProfile>>,
}

impl FakeDirectory {
    pub fn with_profiles(list: Vec<AttendeeProfile>) -> Self {
        let profiles = list
            .into_iter()
            .map(|p| (p.public_identifier.clone(), p))
            .collect();
        Self {
            profiles: Mutex::new(profiles),
        }
    }
}

impl Directory for FakeDirectory {
    fn find(
        &self,
        public_id: &str,
    ) -> impl Future<Output = Result<Option<AttendeeProfile>, DirectoryError>> + Send {
        let found = self.profiles.lock().unwrap().get(public_id).cloned();
        async move { Ok(found) }
    }

    fn count(&self) -> impl Future<Output = Result<u64, DirectoryError>> + Send {
        let n = self.profiles.lock().unwrap().len() as u64;
        async move { Ok(n) }
    }

    fn ingest(
        &self,
        records: Vec<Value>,
    ) -> impl Future<Output = Result<IngestReport, DirectoryError>> + Send {
        let mut map = self.profiles.lock().unwrap();
        let mut inserted = 0u64;
        let mut skipped = 0u64;
        for record in &records {
            let id = record
                .get("publicIdentifier")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let name = record
                .get("fullName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if map.contains_key(&id) {
                skipped += 1;
            } else {
                map.insert(id.clone(), profile(&id, &name));
                inserted += 1;
            }
        }
        async move { Ok(IngestReport { inserted, skipped }) }
    }
}

/// Minimal attendee profile for tests.
pub fn profile(public_id: &str, full_name: &str) -> AttendeeProfile {
    AttendeeProfile {
        public_identifier: public_id.to_string(),
        full_name: full_name.to_string(),
        headline: None,
        job_title: None,
        company_name: None,
        email: None,
        linkedin_url: None,
        profile_pic: None,
        location: None,
        about: None,
        raw_profile: "{}".to_string(),
    }
}
