//! Backend API port.
//!
//! One trait covers every endpoint the client consumes. Implementations map
//! transport failures to [`StratifyError::Transport`], non-2xx replies to
//! [`StratifyError::Api`] and a 401 to [`StratifyError::Unauthorized`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::candle::{CandleQuery, CandleSet};
use crate::domain::error::StratifyError;
use crate::domain::execution::{DashboardStats, MarketInfo, StartExecution, StrategyExecution};
use crate::domain::indicator::Indicator;
use crate::domain::strategy::{Page, Strategy, StrategyFilter};
use crate::domain::user::{AccountForm, User};

/// Preferences sent along with an OAuth exchange so a first login creates
/// the account with the client's current settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginPreferences {
    pub timezone: String,
    pub dark_theme: bool,
}

/// Credentials for one exchange. Blank fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiKey {
    pub exchange: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ApiKey {
    pub fn validate(&self) -> Result<(), StratifyError> {
        if self.exchange.trim().is_empty() {
            return Err(StratifyError::validation("exchange", "select an exchange"));
        }
        let filled = [&self.api_key, &self.secret, &self.password, &self.uid]
            .iter()
            .any(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()));
        if !filled {
            return Err(StratifyError::validation(
                "api_key",
                "provide at least one credential",
            ));
        }
        Ok(())
    }
}

/// Partial update of the current user's preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_real_trading: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub real_trading: bool,
}

impl DashboardQuery {
    /// The last seven days up to `now`.
    pub fn last_week(now: DateTime<Utc>, real_trading: bool) -> Self {
        Self {
            start: now - chrono::Duration::days(7),
            end: now,
            real_trading,
        }
    }
}

#[async_trait]
pub trait StratifyApi: Send + Sync {
    // Session
    async fn check_auth(&self) -> Result<bool, StratifyError>;
    async fn login(&self, username: &str, password: &str) -> Result<(), StratifyError>;
    async fn logout(&self) -> Result<(), StratifyError>;
    async fn google_login(&self, token: &str, prefs: &LoginPreferences) -> Result<(), StratifyError>;
    async fn github_login(&self, code: &str, prefs: &LoginPreferences) -> Result<(), StratifyError>;

    // Account
    async fn current_user(&self) -> Result<User, StratifyError>;
    async fn send_signup_code(&self, form: &AccountForm) -> Result<(), StratifyError>;
    async fn signup(&self, form: &AccountForm, code: &str) -> Result<User, StratifyError>;
    async fn send_update_account_code(&self, form: &AccountForm) -> Result<(), StratifyError>;
    async fn update_account(&self, form: &AccountForm, code: &str) -> Result<User, StratifyError>;
    async fn send_delete_account_code(&self, password: &str) -> Result<(), StratifyError>;
    async fn delete_account(&self, password: &str, code: &str) -> Result<(), StratifyError>;
    async fn send_recover_password_code(&self, email: &str, new_password: &str) -> Result<(), StratifyError>;
    async fn recover_password(&self, email: &str, new_password: &str, code: &str) -> Result<(), StratifyError>;
    /// Flips the stored theme and returns the new `dark_theme` value.
    async fn toggle_theme(&self) -> Result<bool, StratifyError>;
    async fn update_preferences(&self, prefs: &UserPreferences) -> Result<User, StratifyError>;

    // API keys
    async fn api_key_exchanges(&self) -> Result<Vec<String>, StratifyError>;
    async fn save_api_key(&self, key: &ApiKey) -> Result<(), StratifyError>;
    async fn delete_api_key(&self, exchange: &str) -> Result<(), StratifyError>;

    // Market data
    async fn exchanges(&self) -> Result<Vec<String>, StratifyError>;
    async fn symbols(&self, exchange: &str) -> Result<Vec<String>, StratifyError>;
    async fn market_info(&self, exchange: &str, symbol: &str) -> Result<MarketInfo, StratifyError>;
    async fn candles(&self, query: &CandleQuery) -> Result<CandleSet, StratifyError>;

    // Strategies
    async fn strategies(&self, filter: &StrategyFilter) -> Result<Page<Strategy>, StratifyError>;
    async fn strategy(&self, id: u64) -> Result<Strategy, StratifyError>;
    /// Creates an empty draft owned by the current user.
    async fn create_strategy(&self) -> Result<Strategy, StratifyError>;
    async fn update_strategy(&self, strategy: &Strategy) -> Result<Strategy, StratifyError>;
    async fn clone_strategy(&self, id: u64) -> Result<Strategy, StratifyError>;
    async fn delete_strategy(&self, id: u64) -> Result<(), StratifyError>;
    async fn indicator(
        &self,
        strategy_id: u64,
        indicator_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Indicator, StratifyError>;

    // Executions
    async fn executions(&self, strategy_id: u64) -> Result<Vec<StrategyExecution>, StratifyError>;
    async fn execution(&self, id: u64) -> Result<StrategyExecution, StratifyError>;
    async fn start_execution(&self, request: &StartExecution) -> Result<StrategyExecution, StratifyError>;
    async fn stop_execution(&self, id: u64) -> Result<StrategyExecution, StratifyError>;
    async fn delete_execution(&self, id: u64) -> Result<(), StratifyError>;

    async fn dashboard(&self, query: &DashboardQuery) -> Result<DashboardStats, StratifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_needs_exchange_and_a_credential() {
        let mut key = ApiKey {
            exchange: "binance".into(),
            ..ApiKey::default()
        };
        assert!(key.validate().is_err());
        key.secret = Some("  ".into());
        assert!(key.validate().is_err());
        key.api_key = Some("abc".into());
        assert!(key.validate().is_ok());
        key.exchange.clear();
        assert!(key.validate().is_err());
    }

    #[test]
    fn api_key_body_skips_missing_fields() {
        let key = ApiKey {
            exchange: "kraken".into(),
            uid: Some("42".into()),
            ..ApiKey::default()
        };
        let body = serde_json::to_value(&key).unwrap();
        assert_eq!(body, serde_json::json!({"exchange": "kraken", "uid": "42"}));
    }

    #[test]
    fn dashboard_defaults_to_last_week() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let q = DashboardQuery::last_week(now, false);
        assert_eq!((q.end - q.start).num_days(), 7);
    }
}
