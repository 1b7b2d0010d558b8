//! Client configuration.

use std::time::Duration;

use life_core::GridSize;

const DEQUEUE_MS_KEY: &str = "LIFE_DEQUEUE_MS";
const BALANCE_MS_KEY: &str = "LIFE_BALANCE_MS";
const OVERFLOW_THRESHOLD_KEY: &str = "LIFE_OVERFLOW_THRESHOLD";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the server
    pub server_url: String,
    /// Grid dimensions (must match the server)
    pub grid: GridSize,
    /// Cadence at which buffered diffs are applied to the board
    pub dequeue_interval: Duration,
    /// Cadence at which the balancer checks for overflow
    pub balance_interval: Duration,
    /// The buffer overflows when it holds more than this many diffs
    pub overflow_threshold: usize,
    /// Capacity of the channel carrying connection events to the session
    pub inbound_capacity: usize,
    /// Capacity of the session event channel handed to the application
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080".to_string(),
            grid: GridSize::default(),
            dequeue_interval: Duration::from_millis(170),
            balance_interval: Duration::from_secs(8),
            overflow_threshold: 5,
            inbound_capacity: 256,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `server_url`.
    pub fn with_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Apply timing overrides from the environment. Missing, empty or
    /// unparsable values leave the current setting alone.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = read_env_u64(DEQUEUE_MS_KEY).filter(|&ms| ms > 0) {
            self.dequeue_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = read_env_u64(BALANCE_MS_KEY).filter(|&ms| ms > 0) {
            self.balance_interval = Duration::from_millis(ms);
        }
        if let Some(n) = read_env_u64(OVERFLOW_THRESHOLD_KEY) {
            self.overflow_threshold = n as usize;
        }
        self
    }
}

fn read_env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    parse_u64(&raw)
}

fn parse_u64(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<u64>().ok()
}
