//! dex-core — Scan/match orchestration state.
//!
//! Pure state for the identification kiosk: the status state machine,
//! the bounded activity log, and the shapes a matcher response is
//! interpreted into. No I/O lives here; the daemon's engine task is
//! the only writer.

pub mod activity;
pub mod session;
pub mod types;

pub use activity::{ActivityLog, LogEntry, LogKind};
pub use session::{FrameDisposition, ScanSession, StatusKind};
pub use types::{Candidate, MatchOutcome, MatchedIdentity};
