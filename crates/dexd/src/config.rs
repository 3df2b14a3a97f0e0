use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Base URL of the face-recognition service.
    pub matcher_url: String,
    /// Path to the SQLite attendee database.
    pub db_path: PathBuf,
    /// Capture cadence while scanning, in milliseconds.
    pub scan_interval_ms: u64,
    /// Deadline for a single matcher call, in seconds. The upstream
    /// service imposes none; without a client-side bound a hung call
    /// blocks matching forever.
    pub match_timeout_secs: u64,
    /// Command producing one encoded JPEG still on stdout.
    pub capture_command: Vec<String>,
}

impl Config {
    /// Load configuration from `DEX_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("dex");

        let db_path = std::env::var("DEX_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendees.db"));

        let capture_command = std::env::var("DEX_CAPTURE_COMMAND")
            .unwrap_or_else(|_| "fswebcam -q --no-banner --jpeg 90 --save -".to_string())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Self {
            matcher_url: std::env::var("DEX_MATCHER_URL")
                .unwrap_or_else(|_| "http://localhost:5001".to_string()),
            db_path,
            scan_interval_ms: env_u64("DEX_SCAN_INTERVAL_MS", 3000),
            match_timeout_secs: env_u64("DEX_MATCH_TIMEOUT_SECS", 30),
            capture_command,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
