use crate::engine::EngineHandle;
use dex_matcher::HttpMatcher;
use std::sync::Arc;
use zbus::interface;

/// D-Bus interface for the Dex kiosk daemon.
///
/// Bus name: org.dex.Kiosk1
/// Object path: /org/dex/Kiosk1
pub struct KioskService {
    engine: EngineHandle,
    matcher: Arc<HttpMatcher>,
}

impl KioskService {
    pub fn new(engine: EngineHandle, matcher: Arc<HttpMatcher>) -> Self {
        Self { engine, matcher }
    }
}

fn failed(err: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(err.to_string())
}

#[interface(name = "org.dex.Kiosk1")]
impl KioskService {
    /// Arm the capture scheduler and begin scanning.
    async fn start_scanning(&self) -> zbus::fdo::Result<()> {
        tracing::info!("start_scanning requested");
        self.engine.start_scanning().await.map_err(failed)
    }

    /// Disarm the capture scheduler and return to idle.
    async fn stop_scanning(&self) -> zbus::fdo::Result<()> {
        tracing::info!("stop_scanning requested");
        self.engine.stop_scanning().await.map_err(failed)
    }

    /// Full state snapshot (session, last match, candidates, log) as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let snapshot = self.engine.snapshot().await.map_err(failed)?;
        serde_json::to_string(&snapshot).map_err(failed)
    }

    /// The activity log only, oldest entry first, as a JSON array.
    async fn activity_log(&self) -> zbus::fdo::Result<String> {
        let snapshot = self.engine.snapshot().await.map_err(failed)?;
        serde_json::to_string(&snapshot.log).map_err(failed)
    }

    /// Bulk-load attendee profiles from a JSON array of records.
    /// Ingests into the directory and pushes to the recognition
    /// service; returns the combined report as JSON.
    async fn load_profiles(&self, profiles_json: &str) -> zbus::fdo::Result<String> {
        let profiles: Vec<serde_json::Value> = serde_json::from_str(profiles_json)
            .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("profiles must be a JSON array: {e}")))?;
        tracing::info!(count = profiles.len(), "load_profiles requested");
        let report = self.engine.load_profiles(profiles).await.map_err(failed)?;
        serde_json::to_string(&report).map_err(failed)
    }

    /// Probe the recognition service's health endpoint.
    async fn health(&self) -> zbus::fdo::Result<String> {
        let info = self.matcher.health().await.map_err(failed)?;
        serde_json::to_string(&info).map_err(failed)
    }
}
