//! Configuration and paths

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// All configurable paths and constants
#[derive(Debug, Clone)]
pub struct Config {
    pub tracking_url: String,
    pub state_dir: PathBuf,
    pub credentials_file: PathBuf,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub route_window_minutes: i64,
    pub route_max_points: usize,
    pub request_timeout_secs: u64,
    pub worker_idle_secs: u64,
}

impl Config {
    /// Build config from the environment; `TRACCAR_URL` is required
    pub fn from_env() -> Result<Self> {
        let tracking_url = std::env::var("TRACCAR_URL")
            .map_err(|_| Error::Config("TRACCAR_URL is not set".to_string()))?;

        Ok(Self {
            tracking_url: tracking_url.trim_end_matches('/').to_string(),
            ..Self::local_from_env()?
        })
    }

    /// Config for commands that only touch local state. `tracking_url` is left
    /// empty when `TRACCAR_URL` is unset.
    pub fn local_from_env() -> Result<Self> {
        let tracking_url = std::env::var("TRACCAR_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_default();

        let state_dir = match std::env::var("TRACKER_STATE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".tracker-assistant"),
        };

        let credentials_file = std::env::var("TRACKER_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| state_dir.join("traccar_credentials.json"));

        let batch_delay_ms = match std::env::var("TRACKER_BATCH_DELAY_MS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("TRACKER_BATCH_DELAY_MS: {}", raw)))?,
            Err(_) => DEFAULT_BATCH_DELAY_MS,
        };

        Ok(Self {
            tracking_url,
            state_dir,
            credentials_file,
            batch_delay_ms,
            ..Self::defaults()
        })
    }

    /// Create config for testing with custom paths
    pub fn for_test(temp_dir: &Path) -> Self {
        Self {
            tracking_url: "http://127.0.0.1:8082".to_string(),
            state_dir: temp_dir.join("state"),
            credentials_file: temp_dir.join("state/traccar_credentials.json"),
            batch_delay_ms: 0,
            ..Self::defaults()
        }
    }

    fn defaults() -> Self {
        Self {
            tracking_url: String::new(),
            state_dir: PathBuf::new(),
            credentials_file: PathBuf::new(),
            batch_size: 8,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            route_window_minutes: 15,
            route_max_points: 8,
            request_timeout_secs: 30,
            worker_idle_secs: 600,
        }
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn worker_idle(&self) -> Duration {
        Duration::from_secs(self.worker_idle_secs)
    }
}

/// Pause between device-list batches; the chat transport rate-limits bursts
pub const DEFAULT_BATCH_DELAY_MS: u64 = 300;

/// Fix times are shown in America/Sao_Paulo (no DST since 2019)
pub const DISPLAY_UTC_OFFSET_SECS: i32 = -3 * 3600;

pub const START_KEYWORD: &str = "#iniciar";
pub const LOGOUT_KEYWORD: &str = "#sair";
pub const RESET_KEYWORD: &str = "resetar senha";
