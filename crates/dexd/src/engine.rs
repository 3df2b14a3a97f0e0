//! Match orchestrator.
//!
//! A single tokio task owns the scan session, the activity log, and
//! the last match for display. Everything else talks to it through
//! [`EngineHandle`] messages, so timer ticks, user toggles, and
//! matcher responses are serialized into one queue and every state
//! transition is atomic with respect to the others.
//!
//! The matcher call is the only thing that suspends. It runs on its
//! own task and reports back as an internal `MatchSettled` message, so
//! the engine keeps draining ticks while a call is outstanding and
//! drops them against the single-flight guard instead of queueing.

use dex_core::{
    ActivityLog, Candidate, FrameDisposition, LogEntry, LogKind, MatchOutcome, ScanSession,
};
use dex_directory::{AttendeeProfile, Directory, DirectoryError};
use dex_matcher::{FaceMatcher, MatcherError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine task exited")]
    ChannelClosed,
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("matcher error: {0}")]
    Matcher(#[from] MatcherError),
}

/// Read-only view of engine state for the display layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub session: ScanSession,
    /// Top alternatives from the last completed match call.
    pub candidates: Vec<Candidate>,
    pub matched_profile: Option<AttendeeProfile>,
    pub match_confidence: Option<f32>,
    pub profile_count: u64,
    pub log: Vec<LogEntry>,
}

/// Result of a bulk profile load (directory ingest + service push).
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub inserted: u64,
    pub skipped: u64,
    pub embeddings_computed: u64,
    pub embeddings_failed: u64,
}

/// How a spawned matcher call ended. `Fault` is a panic inside the
/// call, surfaced via the nested task's join error.
#[derive(Debug)]
enum MatchFailure {
    Call(MatcherError),
    Fault(String),
}

enum Command {
    StartScanning,
    StopScanning,
    FrameReady(Vec<u8>),
    MatchSettled(Result<MatchOutcome, MatchFailure>),
    Snapshot(oneshot::Sender<EngineSnapshot>),
    LoadProfiles {
        profiles: Vec<Value>,
        reply: oneshot::Sender<Result<LoadReport, EngineError>>,
    },
}

/// Clone-safe handle to the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    pub async fn start_scanning(&self) -> Result<(), EngineError> {
        self.tx
            .send(Command::StartScanning)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn stop_scanning(&self) -> Result<(), EngineError> {
        self.tx
            .send(Command::StopScanning)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Deliver a captured frame from the scheduler.
    pub async fn frame_ready(&self, image: Vec<u8>) -> Result<(), EngineError> {
        self.tx
            .send(Command::FrameReady(image))
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn load_profiles(&self, profiles: Vec<Value>) -> Result<LoadReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::LoadProfiles {
                profiles,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the orchestrator task.
///
/// Returns the command handle and a watch mirroring `scanning`; the
/// capture scheduler arms and disarms off that watch and never touches
/// engine state directly.
pub fn spawn_engine<M, D>(matcher: Arc<M>, directory: Arc<D>) -> (EngineHandle, watch::Receiver<bool>)
where
    M: FaceMatcher,
    D: Directory,
{
    let (tx, rx) = mpsc::channel(32);
    let (armed_tx, armed_rx) = watch::channel(false);
    let engine = Engine {
        session: ScanSession::new(),
        log: ActivityLog::new(),
        candidates: Vec::new(),
        matched_profile: None,
        match_confidence: None,
        matcher,
        directory,
        armed: armed_tx,
        tx: tx.clone(),
    };
    tokio::spawn(engine.run(rx));
    (EngineHandle { tx }, armed_rx)
}

struct Engine<M, D> {
    session: ScanSession,
    log: ActivityLog,
    candidates: Vec<Candidate>,
    matched_profile: Option<AttendeeProfile>,
    match_confidence: Option<f32>,
    matcher: Arc<M>,
    directory: Arc<D>,
    armed: watch::Sender<bool>,
    /// For routing the spawned matcher call's result back into the queue.
    tx: mpsc::Sender<Command>,
}

impl<M, D> Engine<M, D>
where
    M: FaceMatcher,
    D: Directory,
{
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        tracing::info!("engine task started");
        self.log.push(LogKind::Info, "Dex recognition system initialized");
        match self.directory.count().await {
            Ok(n) => self
                .log
                .push(LogKind::Info, format!("Loaded {n} profiles from database")),
            Err(err) => tracing::warn!(error = %err, "could not count attendee profiles"),
        }

        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::StartScanning => self.handle_start(),
                Command::StopScanning => self.handle_stop(),
                Command::FrameReady(image) => self.handle_frame(image),
                Command::MatchSettled(settled) => self.handle_settled(settled).await,
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot().await);
                }
                Command::LoadProfiles { profiles, reply } => {
                    let _ = reply.send(self.handle_load(profiles).await);
                }
            }
        }
        tracing::info!("engine task exiting");
    }

    fn handle_start(&mut self) {
        if self.session.scanning {
            return;
        }
        self.session.start_scanning();
        self.armed.send_replace(true);
        self.log.push(LogKind::Info, "Started scanning");
        tracing::info!("scanning started");
    }

    fn handle_stop(&mut self) {
        // Stop is also the way out of Error after an auto-disarm, so the
        // state reset always runs; only the log entry needs the guard.
        let was_scanning = self.session.scanning;
        self.session.stop_scanning();
        self.armed.send_replace(false);
        if was_scanning {
            self.log.push(LogKind::Info, "Stopped scanning");
            tracing::info!("scanning stopped");
        }
    }

    fn handle_frame(&mut self, image: Vec<u8>) {
        match self.session.accept_frame() {
            FrameDisposition::Stale => {
                tracing::trace!("stale frame ignored, scheduler not yet disarmed");
            }
            FrameDisposition::Busy => {
                tracing::trace!("frame dropped, match already in flight");
            }
            FrameDisposition::Accepted => {
                self.log.push(LogKind::Info, "Capturing frame for analysis...");
                self.log
                    .push(LogKind::Info, "Sending request to recognition service...");

                let matcher = Arc::clone(&self.matcher);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    // The nested spawn turns a panic inside the call into
                    // a join error, so the guard is still released.
                    let settled =
                        match tokio::spawn(async move { matcher.match_face(image).await }).await {
                            Ok(result) => result.map_err(MatchFailure::Call),
                            Err(join_err) => Err(MatchFailure::Fault(join_err.to_string())),
                        };
                    let _ = tx.send(Command::MatchSettled(settled)).await;
                });
            }
        }
    }

    async fn handle_settled(&mut self, settled: Result<MatchOutcome, MatchFailure>) {
        match settled {
            Ok(outcome) => self.apply_outcome(outcome).await,
            Err(failure) => self.apply_failure(failure),
        }
        // Single-flight release, on every settle path.
        self.session.release();
    }

    async fn apply_outcome(&mut self, outcome: MatchOutcome) {
        let MatchOutcome {
            matched,
            candidates,
            elapsed_seconds,
        } = outcome;

        self.log.push(
            LogKind::Success,
            format!("Analysis complete in {elapsed_seconds:.2}s"),
        );

        // Candidates are shown whether or not a confident match exists.
        if !candidates.is_empty() {
            let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
            self.log
                .push(LogKind::Info, format!("Top candidates: {}", names.join(", ")));
            self.candidates = candidates;
        }

        let Some(identity) = matched else {
            self.matched_profile = None;
            self.match_confidence = None;
            self.session.finish_no_match();
            self.log.push(LogKind::Warning, "No confident match found");
            return;
        };

        match self.directory.find(&identity.public_id).await {
            Ok(Some(profile)) => {
                tracing::info!(
                    name = %profile.full_name,
                    confidence = identity.confidence,
                    "attendee matched"
                );
                self.session.finish_matched(&profile.full_name);
                self.log.push(
                    LogKind::Success,
                    format!(
                        "MATCH: {} ({:.1}% confidence)",
                        profile.full_name,
                        identity.confidence * 100.0
                    ),
                );
                self.match_confidence = Some(identity.confidence);
                self.matched_profile = Some(profile);
            }
            Ok(None) => {
                // The matcher knows an identity the directory does not:
                // a consistency fault between collaborators, not a
                // service failure, so scanning stays armed.
                tracing::warn!(
                    public_id = %identity.public_id,
                    "matched identity missing from attendee directory"
                );
                self.session
                    .fail_sync("Database sync error", "Profile found but not loaded in database");
                self.log
                    .push(LogKind::Error, "Database sync error - profile not in directory");
            }
            Err(err) => {
                tracing::error!(error = %err, "directory lookup failed");
                self.session
                    .fail_sync("Attendee directory error", err.to_string());
                self.log
                    .push(LogKind::Error, format!("Directory lookup failed: {err}"));
            }
        }
    }

    fn apply_failure(&mut self, failure: MatchFailure) {
        match failure {
            MatchFailure::Call(MatcherError::Unreachable(detail)) => {
                self.session
                    .fail_service("Service unavailable", "Recognition service is not running");
                self.log.push(
                    LogKind::Error,
                    format!("Cannot connect to recognition service: {detail}"),
                );
            }
            MatchFailure::Call(MatcherError::NoProfilesLoaded) => {
                self.session.fail_service(
                    "No profiles loaded in system",
                    "Load attendee profiles with `dex load <file>`",
                );
                self.log
                    .push(LogKind::Error, "No profiles loaded. Run: dex load <profiles.json>");
            }
            MatchFailure::Call(MatcherError::TimedOut) => {
                self.session.fail_service(
                    "Recognition service error",
                    "Recognition call exceeded the configured deadline",
                );
                self.log.push(LogKind::Error, "Recognition request timed out");
            }
            // Raw status and body surface in the activity log only, never
            // in the user-facing status message.
            MatchFailure::Call(err) => {
                self.session.fail_service(
                    "Recognition service error",
                    "Service returned an error. Check the recognition service logs.",
                );
                self.log
                    .push(LogKind::Error, format!("Recognition service error: {err}"));
            }
            MatchFailure::Fault(detail) => {
                self.session.fail_service(
                    "Recognition service error",
                    "Unexpected fault while matching",
                );
                self.log.push(LogKind::Error, format!("Match task fault: {detail}"));
            }
        }
        self.armed.send_replace(false);
        tracing::warn!("scanning auto-disarmed after matcher failure");
    }

    async fn handle_load(&mut self, profiles: Vec<Value>) -> Result<LoadReport, EngineError> {
        let report = match self.directory.ingest(profiles.clone()).await {
            Ok(report) => report,
            Err(err) => {
                self.log
                    .push(LogKind::Error, format!("Profile upload rejected: {err}"));
                return Err(err.into());
            }
        };
        self.log.push(
            LogKind::Info,
            format!(
                "Loaded {} profiles into directory ({} duplicates skipped)",
                report.inserted, report.skipped
            ),
        );

        let stats = match self.matcher.load_profiles(profiles).await {
            Ok(stats) => stats,
            Err(err) => {
                self.log.push(
                    LogKind::Error,
                    format!("Recognition service did not accept profiles: {err}"),
                );
                return Err(err.into());
            }
        };
        self.log.push(
            LogKind::Info,
            format!(
                "Recognition service computed {} embeddings ({} failed)",
                stats.computed, stats.failed
            ),
        );

        Ok(LoadReport {
            inserted: report.inserted,
            skipped: report.skipped,
            embeddings_computed: stats.computed,
            embeddings_failed: stats.failed,
        })
    }

    async fn snapshot(&self) -> EngineSnapshot {
        let profile_count = match self.directory.count().await {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "profile count failed");
                0
            }
        };
        EngineSnapshot {
            session: self.session.clone(),
            candidates: self.candidates.clone(),
            matched_profile: self.matched_profile.clone(),
            match_confidence: self.match_confidence,
            profile_count,
            log: self.log.entries(),
        }
    }
}
