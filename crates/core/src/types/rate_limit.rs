use serde::{Deserialize, Serialize};

/// Sentinel `remaining` value meaning "unknown" (counter store unreachable).
pub const REMAINING_UNKNOWN: i64 = -1;

/// The three invocation-count windows, narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateWindow {
    PerMinute,
    PerHour,
    PerDay,
}

impl RateWindow {
    /// All windows ordered from narrowest to widest.
    pub const ALL: [RateWindow; 3] = [
        RateWindow::PerMinute,
        RateWindow::PerHour,
        RateWindow::PerDay,
    ];

    /// Window length in seconds.
    pub fn duration_secs(&self) -> i64 {
        match self {
            RateWindow::PerMinute => 60,
            RateWindow::PerHour => 3_600,
            RateWindow::PerDay => 86_400,
        }
    }

    /// Stable name used in counter keys and results.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateWindow::PerMinute => "per_minute",
            RateWindow::PerHour => "per_hour",
            RateWindow::PerDay => "per_day",
        }
    }
}

/// Per-window invocation caps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub per_minute: u64,
    pub per_hour: u64,
    pub per_day: u64,
}

impl RateLimitConfig {
    /// Cap for one window.
    pub fn limit(&self, window: RateWindow) -> u64 {
        match window {
            RateWindow::PerMinute => self.per_minute,
            RateWindow::PerHour => self.per_hour,
            RateWindow::PerDay => self.per_day,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1_000,
            per_day: 10_000,
        }
    }
}

/// Current counts across all windows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WindowUsage {
    pub per_minute: u64,
    pub per_hour: u64,
    pub per_day: u64,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitCheckResult {
    pub allowed: bool,
    /// The first exceeded window, narrowest first, when denied.
    pub limit_exceeded: Option<RateWindow>,
    /// Smallest remaining capacity across all windows when allowed;
    /// [`REMAINING_UNKNOWN`] when the counter store was unreachable.
    pub remaining: i64,
    /// Seconds until the exceeded window resets; 0 when allowed.
    pub retry_after_seconds: u64,
    pub current_usage: WindowUsage,
}
