//! REST adapter for [`StratifyApi`] over reqwest.
//!
//! Credentials travel in cookies kept in a [`Jar`]; the jar's contents can be
//! exported and restored so a session outlives one process. Every
//! reply passes through one check: a 401 sends the user to the login page
//! and fails with [`StratifyError::Unauthorized`]; any other non-2xx status
//! fails with [`StratifyError::Api`] carrying the summarized error body.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::domain::candle::{Candle, CandleQuery, CandleSet};
use crate::domain::config::ClientConfig;
use crate::domain::error::{StratifyError, summarize_error_body};
use crate::domain::execution::{DashboardStats, MarketInfo, StartExecution, StrategyExecution};
use crate::domain::indicator::Indicator;
use crate::domain::routes::LOGIN_PATH;
use crate::domain::strategy::{Page, Strategy, StrategyFilter};
use crate::domain::user::{AccountForm, User};
use crate::ports::api_port::{ApiKey, DashboardQuery, LoginPreferences, StratifyApi, UserPreferences};
use crate::ports::navigation_port::Navigator;

fn transport(err: reqwest::Error) -> StratifyError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "could not reach the server".to_string()
    } else {
        err.to_string()
    };
    StratifyError::Transport { reason }
}

#[derive(Deserialize)]
struct AuthStatus {
    authenticated: bool,
}

/// The candle endpoint answers with a bare array or with an object that
/// also flags truncation.
#[derive(Deserialize)]
#[serde(untagged)]
enum CandleReply {
    Bare(Vec<Candle>),
    Wrapped {
        candles: Vec<Candle>,
        #[serde(default)]
        truncated: bool,
    },
}

pub struct HttpApiAdapter {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    navigator: Arc<dyn Navigator>,
}

impl HttpApiAdapter {
    pub fn new(base_url: Url, timeout: Duration, navigator: Arc<dyn Navigator>) -> Result<Self, StratifyError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            jar,
            base_url,
            navigator,
        })
    }

    pub fn from_config(config: &ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self, StratifyError> {
        Self::new(config.base_url.clone(), config.request_timeout, navigator)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Cookies held for the API, as a `Cookie` header value.
    pub fn session_cookies(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Loads cookies previously returned by [`Self::session_cookies`].
    pub fn restore_session(&self, cookies: &str) {
        for pair in cookies.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.jar.add_cookie_str(pair, &self.base_url);
        }
    }

    fn url(&self, path: &str) -> Result<Url, StratifyError> {
        self.base_url
            .join(path)
            .map_err(|e| StratifyError::validation("path", format!("{path}: {e}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StratifyError> {
        let response = request.send().await.map_err(|err| {
            warn!(error = %err, "network error");
            transport(err)
        })?;
        let status = response.status();
        let url = response.url().path().to_string();
        if status == StatusCode::UNAUTHORIZED {
            warn!(%url, "request unauthorized, redirecting to login");
            self.navigator.navigate(LOGIN_PATH);
            return Err(StratifyError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = summarize_error_body(&body);
            warn!(%url, status = status.as_u16(), %message, "api error");
            return Err(StratifyError::Api {
                status: status.as_u16(),
                message,
            });
        }
        debug!(%url, status = status.as_u16(), "api reply");
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StratifyError> {
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, StratifyError> {
        let request = self.client.get(self.url(path)?);
        Self::decode(self.send(request).await?).await
    }

    async fn get_with<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, StratifyError> {
        let request = self.client.get(self.url(path)?).query(query);
        Self::decode(self.send(request).await?).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, StratifyError> {
        let request = self.client.post(self.url(path)?).json(body);
        Self::decode(self.send(request).await?).await
    }

    /// POST whose reply body is ignored.
    async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), StratifyError> {
        let request = self.client.post(self.url(path)?).json(body);
        self.send(request).await.map(|_| ())
    }

    async fn delete_unit(&self, path: &str, body: Option<&Value>) -> Result<(), StratifyError> {
        let mut request = self.client.delete(self.url(path)?);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl StratifyApi for HttpApiAdapter {
    async fn check_auth(&self) -> Result<bool, StratifyError> {
        let status: AuthStatus = self.get("check-auth/").await?;
        Ok(status.authenticated)
    }

    async fn login(&self, username: &str, password: &str) -> Result<(), StratifyError> {
        self.post_unit("login/", &json!({ "username": username, "password": password }))
            .await
    }

    async fn logout(&self) -> Result<(), StratifyError> {
        self.post_unit("logout/", &json!({})).await
    }

    async fn google_login(&self, token: &str, prefs: &LoginPreferences) -> Result<(), StratifyError> {
        let request = self
            .client
            .post(self.url("google-login/")?)
            .bearer_auth(token)
            .json(prefs);
        self.send(request).await.map(|_| ())
    }

    async fn github_login(&self, code: &str, prefs: &LoginPreferences) -> Result<(), StratifyError> {
        let body = json!({ "code": code, "timezone": prefs.timezone, "dark_theme": prefs.dark_theme });
        self.post_unit("github-login/", &body).await
    }

    async fn current_user(&self) -> Result<User, StratifyError> {
        self.get("user/me/").await
    }

    async fn send_signup_code(&self, form: &AccountForm) -> Result<(), StratifyError> {
        self.post_unit("send-email-signup/", form).await
    }

    async fn signup(&self, form: &AccountForm, code: &str) -> Result<User, StratifyError> {
        let body = json!({
            "email": form.email,
            "username": form.username,
            "password": form.password,
            "code": code,
        });
        self.post("signup/", &body).await
    }

    async fn send_update_account_code(&self, form: &AccountForm) -> Result<(), StratifyError> {
        self.post_unit("send-email-update-account/", form).await
    }

    async fn update_account(&self, form: &AccountForm, code: &str) -> Result<User, StratifyError> {
        let body = json!({
            "email": form.email,
            "username": form.username,
            "password": form.password,
            "code": code,
        });
        let request = self.client.put(self.url("user/me/")?).json(&body);
        Self::decode(self.send(request).await?).await
    }

    async fn send_delete_account_code(&self, password: &str) -> Result<(), StratifyError> {
        self.post_unit("send-email-delete-account/", &json!({ "password": password }))
            .await
    }

    async fn delete_account(&self, password: &str, code: &str) -> Result<(), StratifyError> {
        let body = json!({ "password": password, "code": code });
        self.delete_unit("user/me/", Some(&body)).await
    }

    async fn send_recover_password_code(&self, email: &str, new_password: &str) -> Result<(), StratifyError> {
        let body = json!({ "email": email, "new_password": new_password });
        self.post_unit("send-email-recover-password/", &body).await
    }

    async fn recover_password(&self, email: &str, new_password: &str, code: &str) -> Result<(), StratifyError> {
        let body = json!({ "email": email, "new_password": new_password, "code": code });
        self.post_unit("recover-password/", &body).await
    }

    async fn toggle_theme(&self) -> Result<bool, StratifyError> {
        let reply: Value = self.post("toggle-theme/", &json!({})).await?;
        reply
            .get("dark_theme")
            .and_then(Value::as_bool)
            .ok_or_else(|| StratifyError::Decode {
                reason: "toggle-theme reply lacks dark_theme".into(),
            })
    }

    async fn update_preferences(&self, prefs: &UserPreferences) -> Result<User, StratifyError> {
        let request = self.client.patch(self.url("user/me/")?).json(prefs);
        Self::decode(self.send(request).await?).await
    }

    async fn api_key_exchanges(&self) -> Result<Vec<String>, StratifyError> {
        self.get("apiKey/").await
    }

    async fn save_api_key(&self, key: &ApiKey) -> Result<(), StratifyError> {
        key.validate()?;
        self.post_unit("apiKey/", key).await
    }

    async fn delete_api_key(&self, exchange: &str) -> Result<(), StratifyError> {
        self.delete_unit(&format!("apiKey/{exchange}/"), None).await
    }

    async fn exchanges(&self) -> Result<Vec<String>, StratifyError> {
        self.get("exchanges/").await
    }

    async fn symbols(&self, exchange: &str) -> Result<Vec<String>, StratifyError> {
        self.get(&format!("exchanges/{exchange}/symbols/")).await
    }

    async fn market_info(&self, exchange: &str, symbol: &str) -> Result<MarketInfo, StratifyError> {
        self.get_with(
            &format!("exchanges/{exchange}/market/"),
            &[("symbol", symbol.to_string())],
        )
        .await
    }

    async fn candles(&self, query: &CandleQuery) -> Result<CandleSet, StratifyError> {
        let reply: CandleReply = self.get_with("candles/", query).await?;
        Ok(match reply {
            CandleReply::Bare(candles) => CandleSet::new(candles, false),
            CandleReply::Wrapped { candles, truncated } => CandleSet::new(candles, truncated),
        })
    }

    async fn strategies(&self, filter: &StrategyFilter) -> Result<Page<Strategy>, StratifyError> {
        let params = filter.query_pairs();
        self.get_with("strategy/", &params).await
    }

    async fn strategy(&self, id: u64) -> Result<Strategy, StratifyError> {
        self.get(&format!("strategy/{id}/")).await
    }

    async fn create_strategy(&self) -> Result<Strategy, StratifyError> {
        self.post("strategy/", &json!({})).await
    }

    async fn update_strategy(&self, strategy: &Strategy) -> Result<Strategy, StratifyError> {
        let request = self
            .client
            .put(self.url(&format!("strategy/{}/", strategy.id))?)
            .json(strategy);
        Self::decode(self.send(request).await?).await
    }

    async fn clone_strategy(&self, id: u64) -> Result<Strategy, StratifyError> {
        self.post(&format!("strategy/{id}/clone/"), &json!({})).await
    }

    async fn delete_strategy(&self, id: u64) -> Result<(), StratifyError> {
        self.delete_unit(&format!("strategy/{id}/"), None).await
    }

    async fn indicator(
        &self,
        strategy_id: u64,
        indicator_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Indicator, StratifyError> {
        let params = [
            ("start", start.to_rfc3339()),
            ("end", end.to_rfc3339()),
        ];
        self.get_with(&format!("strategy/{strategy_id}/indicator/{indicator_id}/"), &params)
            .await
    }

    async fn executions(&self, strategy_id: u64) -> Result<Vec<StrategyExecution>, StratifyError> {
        self.get_with("strategy-execution/", &[("strategy", strategy_id.to_string())])
            .await
    }

    async fn execution(&self, id: u64) -> Result<StrategyExecution, StratifyError> {
        self.get(&format!("strategy-execution/{id}/")).await
    }

    async fn start_execution(&self, request: &StartExecution) -> Result<StrategyExecution, StratifyError> {
        self.post("strategy-execution/", request).await
    }

    async fn stop_execution(&self, id: u64) -> Result<StrategyExecution, StratifyError> {
        self.post(&format!("strategy-execution/{id}/stop/"), &json!({})).await
    }

    async fn delete_execution(&self, id: u64) -> Result<(), StratifyError> {
        self.delete_unit(&format!("strategy-execution/{id}/"), None).await
    }

    async fn dashboard(&self, query: &DashboardQuery) -> Result<DashboardStats, StratifyError> {
        let params = [
            ("start", query.start.to_rfc3339()),
            ("end", query.end.to_rfc3339()),
            ("real_trading", query.real_trading.to_string()),
        ];
        self.get_with("dashboard/", &params).await
    }
}
