//! Typed client configuration read through a [`ConfigPort`].

use std::time::Duration;

use chrono_tz::Tz;
use url::Url;

use crate::domain::config_validation::validate_client_config;
use crate::domain::error::StratifyError;
use crate::domain::timezone::{DEFAULT_TIMEZONE, parse_timezone};
use crate::domain::user::Theme;
use crate::ports::config_port::ConfigPort;

const FALLBACK_API_URL: &str = "http://localhost:8000/api/v1/";

pub const DEFAULT_TIMEOUT_SECS: i64 = 30;
pub const DEFAULT_POLL_SECS: i64 = 5;

/// API base URL baked in at build time, if any.
pub fn default_api_url() -> &'static str {
    option_env!("STRATIFY_API_URL").unwrap_or(FALLBACK_API_URL)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Always ends with `/` so relative endpoint paths join under it.
    pub base_url: Url,
    pub request_timeout: Duration,
    pub google_client_id: Option<String>,
    pub github_client_id: Option<String>,
    pub timezone: Tz,
    pub theme: Theme,
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, StratifyError> {
        validate_client_config(config)?;

        let raw_url = config
            .get_string("api", "base_url")
            .unwrap_or_else(|| default_api_url().to_string());
        let base_url = parse_base_url(&raw_url)?;

        let timezone = config
            .get_string("display", "timezone")
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let theme = match config.get_string("display", "theme") {
            Some(value) => value.parse::<Theme>().map_err(|_| StratifyError::ConfigInvalid {
                section: "display".to_string(),
                key: "theme".to_string(),
                reason: "theme must be light or dark".to_string(),
            })?,
            None => Theme::Light,
        };

        Ok(Self {
            base_url,
            request_timeout: seconds(config.get_int("api", "request_timeout_secs", DEFAULT_TIMEOUT_SECS)),
            google_client_id: non_empty(config.get_string("oauth", "google_client_id")),
            github_client_id: non_empty(config.get_string("oauth", "github_client_id")),
            timezone: parse_timezone(&timezone)?,
            theme,
            poll_interval: seconds(config.get_int("polling", "interval_secs", DEFAULT_POLL_SECS)),
        })
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, StratifyError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|e| StratifyError::ConfigInvalid {
        section: "api".to_string(),
        key: "base_url".to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(StratifyError::ConfigInvalid {
            section: "api".to_string(),
            key: "base_url".to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}

fn seconds(value: i64) -> Duration {
    Duration::from_secs(value.max(1) as u64)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
