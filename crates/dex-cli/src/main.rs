use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

#[zbus::proxy(
    interface = "org.dex.Kiosk1",
    default_service = "org.dex.Kiosk1",
    default_path = "/org/dex/Kiosk1"
)]
trait Kiosk {
    fn start_scanning(&self) -> zbus::Result<()>;
    fn stop_scanning(&self) -> zbus::Result<()>;
    fn status(&self) -> zbus::Result<String>;
    fn activity_log(&self) -> zbus::Result<String>;
    fn load_profiles(&self, profiles_json: &str) -> zbus::Result<String>;
    fn health(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "dex", about = "Dex attendee-identification kiosk CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start scanning for faces
    Start,
    /// Stop scanning
    Stop,
    /// Show current kiosk status
    Status,
    /// Show the activity log
    Log,
    /// Bulk-load attendee profiles from a JSON file
    Load {
        /// Path to a JSON array of profile records
        file: String,
    },
    /// Check the recognition service
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = zbus::Connection::session()
        .await
        .context("connecting to the session bus (is dexd running?)")?;
    let proxy = KioskProxy::new(&connection).await?;

    match cli.command {
        Commands::Start => {
            proxy.start_scanning().await?;
            println!("Scanning started");
        }
        Commands::Stop => {
            proxy.stop_scanning().await?;
            println!("Scanning stopped");
        }
        Commands::Status => {
            let snapshot: Value = serde_json::from_str(&proxy.status().await?)?;
            print_status(&snapshot);
        }
        Commands::Log => {
            let entries: Vec<Value> = serde_json::from_str(&proxy.activity_log().await?)?;
            for entry in entries {
                println!(
                    "{} {:7} {}",
                    entry["timestamp"].as_str().unwrap_or("--:--:--"),
                    entry["kind"].as_str().unwrap_or("?").to_uppercase(),
                    entry["message"].as_str().unwrap_or("")
                );
            }
        }
        Commands::Load { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {file}"))?;
            let report: Value = serde_json::from_str(&proxy.load_profiles(&json).await?)?;
            println!(
                "Loaded {} profiles ({} duplicates skipped); {} embeddings computed, {} failed",
                report["inserted"], report["skipped"],
                report["embeddingsComputed"], report["embeddingsFailed"]
            );
        }
        Commands::Health => {
            let health: Value = serde_json::from_str(&proxy.health().await?)?;
            println!(
                "service: {}  model: {}  profiles loaded: {}",
                health["status"].as_str().unwrap_or("unknown"),
                health["model"].as_str().unwrap_or("unknown"),
                health["profiles_loaded"]
            );
        }
    }

    Ok(())
}

fn print_status(snapshot: &Value) {
    let session = &snapshot["session"];
    println!(
        "status:   {} — {}",
        session["status"].as_str().unwrap_or("unknown"),
        session["statusMessage"].as_str().unwrap_or("")
    );
    println!(
        "scanning: {}  in-flight: {}  profiles: {}",
        session["scanning"], session["inFlight"], snapshot["profileCount"]
    );
    if let Some(err) = session["lastError"].as_str() {
        println!("error:    {err}");
    }
    if let Some(profile) = snapshot["matchedProfile"].as_object() {
        let confidence = snapshot["matchConfidence"].as_f64().unwrap_or(0.0);
        println!(
            "matched:  {} ({:.1}%)",
            profile.get("fullName").and_then(Value::as_str).unwrap_or("?"),
            confidence * 100.0
        );
    }
    if let Some(candidates) = snapshot["candidates"].as_array() {
        for (i, c) in candidates.iter().enumerate() {
            println!(
                "  {}. {} — {:.1}%",
                i + 1,
                c["name"].as_str().unwrap_or("?"),
                c["confidence"].as_f64().unwrap_or(0.0) * 100.0
            );
        }
    }
}
