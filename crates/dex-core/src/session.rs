//! Scan session state machine.
//!
//! One instance per process, owned exclusively by the orchestrator
//! engine. Every transition of the kiosk's user-visible status goes
//! through the methods here, so the transition table is testable
//! without any async machinery.

use serde::Serialize;

/// User-visible status of the kiosk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusKind {
    Idle,
    Scanning,
    Analyzing,
    Matched,
    NoMatch,
    Error,
}

/// Outcome of offering a frame-ready event to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Scanning is off; the tick raced a disarm. Ignored.
    Stale,
    /// A matcher call is already outstanding. Dropped silently.
    Busy,
    /// Accepted: the session is now analyzing and in flight.
    Accepted,
}

/// Process-wide scan state. Single writer (the engine task).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSession {
    /// Whether the capture scheduler is armed.
    pub scanning: bool,
    /// True exactly while a matcher call is outstanding (single-flight).
    pub in_flight: bool,
    pub status: StatusKind,
    pub status_message: String,
    /// Set on entering Error, cleared on any successful transition away.
    pub last_error: Option<String>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            scanning: false,
            in_flight: false,
            status: StatusKind::Idle,
            status_message: "Ready to scan".to_string(),
            last_error: None,
        }
    }

    /// User starts scanning. Idempotent.
    pub fn start_scanning(&mut self) {
        self.scanning = true;
        self.status = StatusKind::Scanning;
        self.status_message = "Scanning for faces...".to_string();
        self.last_error = None;
    }

    /// User stops scanning. Valid from any state; this is also the only
    /// way out of `Error`.
    pub fn stop_scanning(&mut self) {
        self.scanning = false;
        self.status = StatusKind::Idle;
        self.status_message = "Ready to scan".to_string();
        self.last_error = None;
    }

    /// Offer a frame-ready event. Checks are ordered: stale before busy.
    /// On `Accepted` the session enters Analyzing with the single-flight
    /// guard raised.
    pub fn accept_frame(&mut self) -> FrameDisposition {
        if !self.scanning {
            return FrameDisposition::Stale;
        }
        if self.in_flight {
            return FrameDisposition::Busy;
        }
        self.in_flight = true;
        self.status = StatusKind::Analyzing;
        self.status_message = "Analyzing face pattern...".to_string();
        self.last_error = None;
        FrameDisposition::Accepted
    }

    /// Matcher returned an identity and the directory resolved it.
    pub fn finish_matched(&mut self, full_name: &str) {
        self.status = StatusKind::Matched;
        self.status_message = format!("Match found: {full_name}");
        self.last_error = None;
    }

    /// Matcher returned no identity. A normal, successful response.
    pub fn finish_no_match(&mut self) {
        self.status = StatusKind::NoMatch;
        self.status_message = "No confident match detected".to_string();
        self.last_error = None;
    }

    /// Data inconsistency between matcher and directory. Scanning stays
    /// armed: this is not a service failure the next frame would repeat.
    pub fn fail_sync(&mut self, message: &str, detail: impl Into<String>) {
        self.status = StatusKind::Error;
        self.status_message = message.to_string();
        self.last_error = Some(detail.into());
    }

    /// Matcher call failed. Auto-disarms scanning; only user action
    /// (stop then start) re-arms.
    pub fn fail_service(&mut self, message: &str, detail: impl Into<String>) {
        self.scanning = false;
        self.status = StatusKind::Error;
        self.status_message = message.to_string();
        self.last_error = Some(detail.into());
    }

    /// Drop the single-flight guard. Must run on every settle path.
    pub fn release(&mut self) {
        self.in_flight = false;
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let s = ScanSession::new();
        assert_eq!(s.status, StatusKind::Idle);
        assert!(!s.scanning);
        assert!(!s.in_flight);
        assert!(s.last_error.is_none());
    }

    #[test]
    fn test_start_stop_transitions() {
        let mut s = ScanSession::new();
        s.start_scanning();
        assert_eq!(s.status, StatusKind::Scanning);
        assert!(s.scanning);
        s.stop_scanning();
        assert_eq!(s.status, StatusKind::Idle);
        assert!(!s.scanning);
    }

    #[test]
    fn test_start_scanning_idempotent() {
        let mut s = ScanSession::new();
        s.start_scanning();
        s.start_scanning();
        assert_eq!(s.status, StatusKind::Scanning);
        assert!(s.scanning);
    }

    #[test]
    fn test_frame_while_not_scanning_is_stale() {
        let mut s = ScanSession::new();
        assert_eq!(s.accept_frame(), FrameDisposition::Stale);
        assert_eq!(s.status, StatusKind::Idle);
        assert!(!s.in_flight);
    }

    #[test]
    fn test_stale_check_comes_before_busy_check() {
        // A frame delivered after disarm while a call is still in flight
        // must be reported stale, not busy.
        let mut s = ScanSession::new();
        s.start_scanning();
        assert_eq!(s.accept_frame(), FrameDisposition::Accepted);
        s.stop_scanning();
        assert!(s.in_flight);
        assert_eq!(s.accept_frame(), FrameDisposition::Stale);
    }

    #[test]
    fn test_accepted_frame_enters_analyzing() {
        let mut s = ScanSession::new();
        s.start_scanning();
        assert_eq!(s.accept_frame(), FrameDisposition::Accepted);
        assert_eq!(s.status, StatusKind::Analyzing);
        assert_eq!(s.status_message, "Analyzing face pattern...");
        assert!(s.in_flight);
    }

    #[test]
    fn test_second_frame_while_in_flight_is_busy() {
        let mut s = ScanSession::new();
        s.start_scanning();
        assert_eq!(s.accept_frame(), FrameDisposition::Accepted);
        let before = s.clone();
        assert_eq!(s.accept_frame(), FrameDisposition::Busy);
        assert_eq!(s.status, before.status);
        assert_eq!(s.status_message, before.status_message);
    }

    #[test]
    fn test_matched_transition() {
        let mut s = ScanSession::new();
        s.start_scanning();
        s.accept_frame();
        s.finish_matched("Ada Lovelace");
        s.release();
        assert_eq!(s.status, StatusKind::Matched);
        assert_eq!(s.status_message, "Match found: Ada Lovelace");
        assert!(!s.in_flight);
        assert!(s.scanning);
    }

    #[test]
    fn test_no_match_transition() {
        let mut s = ScanSession::new();
        s.start_scanning();
        s.accept_frame();
        s.finish_no_match();
        s.release();
        assert_eq!(s.status, StatusKind::NoMatch);
        assert_eq!(s.status_message, "No confident match detected");
        assert!(s.last_error.is_none());
        assert!(s.scanning);
    }

    #[test]
    fn test_service_failure_auto_disarms() {
        let mut s = ScanSession::new();
        s.start_scanning();
        s.accept_frame();
        s.fail_service("Service unavailable", "recognition service not running");
        s.release();
        assert_eq!(s.status, StatusKind::Error);
        assert!(!s.scanning);
        assert_eq!(
            s.last_error.as_deref(),
            Some("recognition service not running")
        );
    }

    #[test]
    fn test_sync_failure_keeps_scanning_armed() {
        let mut s = ScanSession::new();
        s.start_scanning();
        s.accept_frame();
        s.fail_sync("Database sync error", "Profile found but not loaded in database");
        s.release();
        assert_eq!(s.status, StatusKind::Error);
        assert!(s.scanning, "data inconsistency must not disarm the scheduler");
    }

    #[test]
    fn test_error_recovered_only_by_user_toggle() {
        let mut s = ScanSession::new();
        s.start_scanning();
        s.accept_frame();
        s.fail_service("Service unavailable", "down");
        s.release();
        // A frame after auto-disarm is stale, state unchanged.
        assert_eq!(s.accept_frame(), FrameDisposition::Stale);
        assert_eq!(s.status, StatusKind::Error);
        // Toggle off then on recovers.
        s.stop_scanning();
        assert_eq!(s.status, StatusKind::Idle);
        assert!(s.last_error.is_none());
        s.start_scanning();
        assert_eq!(s.status, StatusKind::Scanning);
    }

    #[test]
    fn test_next_accepted_frame_reenters_analyzing() {
        let mut s = ScanSession::new();
        s.start_scanning();
        s.accept_frame();
        s.finish_matched("Ada Lovelace");
        s.release();
        assert_eq!(s.accept_frame(), FrameDisposition::Accepted);
        assert_eq!(s.status, StatusKind::Analyzing);
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&StatusKind::NoMatch).unwrap(),
            "\"no-match\""
        );
        assert_eq!(serde_json::to_string(&StatusKind::Idle).unwrap(), "\"idle\"");
    }
}
