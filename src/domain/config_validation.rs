//! Configuration validation.
//!
//! Checks every configured field before the client talks to the API.
//! Missing keys are fine; they fall back to defaults.

use crate::domain::config::parse_base_url;
use crate::domain::error::StratifyError;
use crate::domain::timezone::parse_timezone;
use crate::ports::config_port::ConfigPort;

pub fn validate_client_config(config: &dyn ConfigPort) -> Result<(), StratifyError> {
    validate_base_url(config)?;
    validate_positive(config, "api", "request_timeout_secs")?;
    validate_positive(config, "polling", "interval_secs")?;
    validate_timezone(config)?;
    validate_theme(config)?;
    Ok(())
}

fn validate_base_url(config: &dyn ConfigPort) -> Result<(), StratifyError> {
    match config.get_string("api", "base_url") {
        Some(url) => parse_base_url(&url).map(|_| ()),
        None => Ok(()),
    }
}

fn validate_positive(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), StratifyError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(());
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => Ok(()),
        _ => Err(StratifyError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be a positive whole number of seconds"),
        }),
    }
}

fn validate_timezone(config: &dyn ConfigPort) -> Result<(), StratifyError> {
    match config.get_string("display", "timezone") {
        Some(name) => parse_timezone(&name)
            .map(|_| ())
            .map_err(|_| StratifyError::ConfigInvalid {
                section: "display".to_string(),
                key: "timezone".to_string(),
                reason: format!("unknown timezone {name}"),
            }),
        None => Ok(()),
    }
}

fn validate_theme(config: &dyn ConfigPort) -> Result<(), StratifyError> {
    match config.get_string("display", "theme") {
        Some(theme) if !matches!(theme.trim().to_lowercase().as_str(), "light" | "dark") => {
            Err(StratifyError::ConfigInvalid {
                section: "display".to_string(),
                key: "theme".to_string(),
                reason: "theme must be light or dark".to_string(),
            })
        }
        _ => Ok(()),
    }
}
