//! Runtime configuration for the users API client and the verification flow.
//! Values come from the command line (with environment fallbacks); none of them
//! are secrets.

use crate::api::ApiError;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Lifetime of a freshly issued verification code.
pub const DEFAULT_CODE_TTL_SECS: u64 = 600;
pub const DEFAULT_SUCCESS_DELAY_MS: u64 = 1_500;

/// Where and how to reach the users API.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Parses the base URL, rejecting anything that is not http(s).
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` when the URL is empty, malformed or uses another scheme.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let trimmed = normalize_base_url(base_url)
            .ok_or_else(|| ApiError::Config("API base URL is empty".to_string()))?;

        let base_url = Url::parse(&trimmed)
            .map_err(|err| ApiError::Config(format!("Invalid API base URL: {err}")))?;

        match base_url.scheme() {
            "http" | "https" => Ok(Self { base_url, timeout }),
            scheme => Err(ApiError::Config(format!(
                "Unsupported API URL scheme: {scheme}"
            ))),
        }
    }
}

/// Timing knobs of the verification stages.
#[derive(Clone, Debug)]
pub struct FlowSettings {
    pub code_ttl: Duration,
    /// Countdown granularity.
    pub tick: Duration,
    /// Pause between an accepted code and the stage transition.
    pub success_delay: Duration,
    /// Spawn a countdown task per session. When false the caller feeds ticks.
    pub auto_countdown: bool,
}

impl FlowSettings {
    /// Number of ticks a fresh session lives for.
    #[must_use]
    pub fn ttl_ticks(&self) -> u64 {
        let tick = self.tick.as_millis().max(1);
        let ticks = self.code_ttl.as_millis().div_ceil(tick);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(DEFAULT_CODE_TTL_SECS),
            tick: Duration::from_secs(1),
            success_delay: Duration::from_millis(DEFAULT_SUCCESS_DELAY_MS),
            auto_countdown: true,
        }
    }
}

fn normalize_base_url(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
