use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod camera;
mod config;
mod dbus_interface;
mod engine;
mod scheduler;
#[cfg(test)]
mod testutil;

use camera::StillCamera;
use config::Config;
use dbus_interface::KioskService;
use dex_directory::SqliteDirectory;
use dex_matcher::HttpMatcher;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("dexd starting");

    let config = Config::from_env();

    let directory = SqliteDirectory::open(&config.db_path).await?;
    tracing::info!(path = %config.db_path.display(), "attendee directory opened");

    let matcher = Arc::new(HttpMatcher::new(
        &config.matcher_url,
        Duration::from_secs(config.match_timeout_secs),
    )?);
    tracing::info!(url = %config.matcher_url, "recognition service client ready");

    let (engine, armed) = engine::spawn_engine(Arc::clone(&matcher), Arc::new(directory));

    let camera = StillCamera::new(config.capture_command.clone())?;
    let cancel = CancellationToken::new();
    tokio::spawn(scheduler::run_scheduler(
        camera,
        engine.clone(),
        Duration::from_millis(config.scan_interval_ms),
        armed,
        cancel.clone(),
    ));

    let _conn = zbus::connection::Builder::session()?
        .name("org.dex.Kiosk1")?
        .serve_at("/org/dex/Kiosk1", KioskService::new(engine, matcher))?
        .build()
        .await?;

    tracing::info!("dexd ready");

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    tracing::info!("dexd shutting down");

    Ok(())
}
