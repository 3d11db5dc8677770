#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

pub use stratify::adapters::console::RouteRecorder;
pub use stratify::adapters::headless_chart::HeadlessChart;
use stratify::domain::candle::{Candle, CandleQuery, CandleSet};
use stratify::domain::chart::CandleChart;
use stratify::domain::error::StratifyError;
use stratify::domain::execution::{
    DashboardStats, MarketInfo, StartExecution, StrategyExecution, Trade,
};
use stratify::domain::indicator::{Indicator, IndicatorParam, IndicatorPoint};
use stratify::domain::polling::GenerationCounter;
use stratify::domain::strategy::{Page, Strategy, StrategyFilter};
use stratify::domain::user::{AccountForm, User};
use stratify::ports::api_port::{
    ApiKey, DashboardQuery, LoginPreferences, StratifyApi, UserPreferences,
};
use stratify::ports::notify_port::{Notice, Notifier};

#[derive(Default)]
pub struct MockState {
    pub authenticated: bool,
    pub user: Option<User>,
    pub password: String,
    pub strategies: HashMap<u64, Strategy>,
    pub next_strategy_id: u64,
    pub candles: Vec<Candle>,
    pub truncated: bool,
    pub market: Option<MarketInfo>,
    pub failing_indicators: HashSet<String>,
    pub executions: HashMap<u64, Vec<StrategyExecution>>,
    /// Replies served by `execution`, oldest first; the last one repeats.
    pub execution_replies: HashMap<u64, VecDeque<StrategyExecution>>,
    /// Advanced during every `execution` call, as if the user switched away.
    pub supersede_on_poll: Option<GenerationCounter>,
    pub failures: HashMap<&'static str, (u16, String)>,
    pub dashboard: DashboardStats,
    pub api_keys: Vec<String>,
    pub calls: Vec<String>,
    pub dashboard_queries: Vec<DashboardQuery>,
    pub started: Vec<StartExecution>,
}

/// In-memory API that records every call.
#[derive(Default)]
pub struct MockApi {
    pub state: Mutex<MockState>,
}

impl MockApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.state.lock().unwrap().next_strategy_id = 100;
        api
    }

    pub fn signed_in(self, user: User) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.authenticated = true;
            s.user = Some(user);
        }
        self
    }

    pub fn with_password(self, password: &str) -> Self {
        self.state.lock().unwrap().password = password.to_string();
        self
    }

    pub fn with_strategy(self, strategy: Strategy) -> Self {
        self.state
            .lock()
            .unwrap()
            .strategies
            .insert(strategy.id, strategy);
        self
    }

    pub fn with_candles(self, candles: Vec<Candle>) -> Self {
        self.state.lock().unwrap().candles = candles;
        self
    }

    pub fn with_truncated_candles(self) -> Self {
        self.state.lock().unwrap().truncated = true;
        self
    }

    pub fn with_market(self, market: MarketInfo) -> Self {
        self.state.lock().unwrap().market = Some(market);
        self
    }

    pub fn with_failing_indicator(self, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_indicators
            .insert(id.to_string());
        self
    }

    pub fn with_executions(self, strategy_id: u64, executions: Vec<StrategyExecution>) -> Self {
        self.state
            .lock()
            .unwrap()
            .executions
            .insert(strategy_id, executions);
        self
    }

    pub fn with_execution_replies(self, id: u64, replies: Vec<StrategyExecution>) -> Self {
        self.state
            .lock()
            .unwrap()
            .execution_replies
            .insert(id, replies.into());
        self
    }

    pub fn superseding(self, generations: GenerationCounter) -> Self {
        self.state.lock().unwrap().supersede_on_poll = Some(generations);
        self
    }

    /// Makes `method` answer with an API error.
    pub fn failing(self, method: &'static str, status: u16, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(method, (status, message.to_string()));
        self
    }

    pub fn with_dashboard(self, stats: DashboardStats) -> Self {
        self.state.lock().unwrap().dashboard = stats;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn stored(&self, id: u64) -> Option<Strategy> {
        self.state.lock().unwrap().strategies.get(&id).cloned()
    }

    fn enter(&self, call: String, method: &'static str) -> Result<std::sync::MutexGuard<'_, MockState>, StratifyError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some((status, message)) = state.failures.get(method) {
            if *status == 401 {
                return Err(StratifyError::Unauthorized);
            }
            return Err(StratifyError::Api {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(state)
    }

    fn signed_in_user(state: &MockState) -> Result<User, StratifyError> {
        match (&state.user, state.authenticated) {
            (Some(user), true) => Ok(user.clone()),
            _ => Err(StratifyError::Unauthorized),
        }
    }
}

#[async_trait]
impl StratifyApi for MockApi {
    async fn check_auth(&self) -> Result<bool, StratifyError> {
        let state = self.enter("check_auth".into(), "check_auth")?;
        Ok(state.authenticated)
    }

    async fn login(&self, username: &str, password: &str) -> Result<(), StratifyError> {
        let mut state = self.enter(format!("login:{username}"), "login")?;
        let known = state.user.as_ref().is_some_and(|u| u.username == username);
        if !known || state.password != password {
            return Err(StratifyError::Api {
                status: 400,
                message: "Invalid credentials".into(),
            });
        }
        state.authenticated = true;
        Ok(())
    }

    async fn logout(&self) -> Result<(), StratifyError> {
        let mut state = self.enter("logout".into(), "logout")?;
        state.authenticated = false;
        Ok(())
    }

    async fn google_login(&self, token: &str, prefs: &LoginPreferences) -> Result<(), StratifyError> {
        let mut state = self.enter(
            format!("google_login:{token}:{}:{}", prefs.timezone, prefs.dark_theme),
            "google_login",
        )?;
        state.authenticated = state.user.is_some();
        Ok(())
    }

    async fn github_login(&self, code: &str, prefs: &LoginPreferences) -> Result<(), StratifyError> {
        let mut state = self.enter(
            format!("github_login:{code}:{}:{}", prefs.timezone, prefs.dark_theme),
            "github_login",
        )?;
        state.authenticated = state.user.is_some();
        Ok(())
    }

    async fn current_user(&self) -> Result<User, StratifyError> {
        let state = self.enter("current_user".into(), "current_user")?;
        Self::signed_in_user(&state)
    }

    async fn send_signup_code(&self, form: &AccountForm) -> Result<(), StratifyError> {
        let _guard = self.enter(format!("send_signup_code:{}", form.email), "send_signup_code")?;
        Ok(())
    }

    async fn signup(&self, form: &AccountForm, code: &str) -> Result<User, StratifyError> {
        let mut state = self.enter(format!("signup:{code}"), "signup")?;
        let created = user(7, &form.username);
        state.user = Some(User {
            email: form.email.clone(),
            ..created
        });
        state.authenticated = true;
        Self::signed_in_user(&state)
    }

    async fn send_update_account_code(&self, form: &AccountForm) -> Result<(), StratifyError> {
        let _guard = self.enter(
            format!("send_update_account_code:{}", form.email),
            "send_update_account_code",
        )?;
        Ok(())
    }

    async fn update_account(&self, form: &AccountForm, code: &str) -> Result<User, StratifyError> {
        let mut state = self.enter(format!("update_account:{code}"), "update_account")?;
        let mut current = Self::signed_in_user(&state)?;
        current.email = form.email.clone();
        current.username = form.username.clone();
        state.user = Some(current.clone());
        Ok(current)
    }

    async fn send_delete_account_code(&self, _password: &str) -> Result<(), StratifyError> {
        let _guard = self.enter("send_delete_account_code".into(), "send_delete_account_code")?;
        Ok(())
    }

    async fn delete_account(&self, _password: &str, code: &str) -> Result<(), StratifyError> {
        let mut state = self.enter(format!("delete_account:{code}"), "delete_account")?;
        state.user = None;
        state.authenticated = false;
        Ok(())
    }

    async fn send_recover_password_code(&self, email: &str, _new_password: &str) -> Result<(), StratifyError> {
        let _guard = self.enter(
            format!("send_recover_password_code:{email}"),
            "send_recover_password_code",
        )?;
        Ok(())
    }

    async fn recover_password(&self, email: &str, new_password: &str, code: &str) -> Result<(), StratifyError> {
        let mut state = self.enter(format!("recover_password:{email}:{code}"), "recover_password")?;
        state.password = new_password.to_string();
        Ok(())
    }

    async fn toggle_theme(&self) -> Result<bool, StratifyError> {
        let mut state = self.enter("toggle_theme".into(), "toggle_theme")?;
        let mut current = Self::signed_in_user(&state)?;
        current.dark_theme = !current.dark_theme;
        let dark = current.dark_theme;
        state.user = Some(current);
        Ok(dark)
    }

    async fn update_preferences(&self, prefs: &UserPreferences) -> Result<User, StratifyError> {
        let mut state = self.enter("update_preferences".into(), "update_preferences")?;
        let mut current = Self::signed_in_user(&state)?;
        if let Some(tz) = &prefs.timezone {
            current.timezone = tz.clone();
        }
        if let Some(real) = prefs.dashboard_real_trading {
            current.dashboard_real_trading = real;
        }
        state.user = Some(current.clone());
        Ok(current)
    }

    async fn api_key_exchanges(&self) -> Result<Vec<String>, StratifyError> {
        let state = self.enter("api_key_exchanges".into(), "api_key_exchanges")?;
        Ok(state.api_keys.clone())
    }

    async fn save_api_key(&self, key: &ApiKey) -> Result<(), StratifyError> {
        let mut state = self.enter(format!("save_api_key:{}", key.exchange), "save_api_key")?;
        if !state.api_keys.contains(&key.exchange) {
            state.api_keys.push(key.exchange.clone());
        }
        Ok(())
    }

    async fn delete_api_key(&self, exchange: &str) -> Result<(), StratifyError> {
        let mut state = self.enter(format!("delete_api_key:{exchange}"), "delete_api_key")?;
        state.api_keys.retain(|e| e != exchange);
        Ok(())
    }

    async fn exchanges(&self) -> Result<Vec<String>, StratifyError> {
        let _guard = self.enter("exchanges".into(), "exchanges")?;
        Ok(vec!["binance".into(), "kraken".into()])
    }

    async fn symbols(&self, exchange: &str) -> Result<Vec<String>, StratifyError> {
        let _guard = self.enter(format!("symbols:{exchange}"), "symbols")?;
        Ok(vec!["BTC/USDT".into(), "BTC/USDT:USDT".into()])
    }

    async fn market_info(&self, exchange: &str, symbol: &str) -> Result<MarketInfo, StratifyError> {
        let state = self.enter(format!("market_info:{exchange}:{symbol}"), "market_info")?;
        state
            .market
            .clone()
            .ok_or_else(|| StratifyError::not_found("market", symbol))
    }

    async fn candles(&self, query: &CandleQuery) -> Result<CandleSet, StratifyError> {
        let state = self.enter(format!("candles:{}:{}", query.symbol, query.timeframe), "candles")?;
        Ok(CandleSet::new(state.candles.clone(), state.truncated))
    }

    async fn strategies(&self, filter: &StrategyFilter) -> Result<Page<Strategy>, StratifyError> {
        let state = self.enter(format!("strategies:{}", filter.page), "strategies")?;
        let mut all: Vec<Strategy> = state
            .strategies
            .values()
            .filter(|s| {
                filter
                    .name
                    .as_deref()
                    .is_none_or(|n| s.name.to_lowercase().contains(&n.to_lowercase()))
            })
            .cloned()
            .collect();
        all.sort_by_key(|s| s.id);
        let count = all.len() as u64;
        let page = filter.page.max(1) as usize;
        let results = all.into_iter().skip((page - 1) * 10).take(10).collect();
        Ok(Page { count, results })
    }

    async fn strategy(&self, id: u64) -> Result<Strategy, StratifyError> {
        let state = self.enter(format!("strategy:{id}"), "strategy")?;
        state
            .strategies
            .get(&id)
            .map(|s| Strategy {
                indicators: s.stored_indicators(),
                ..s.clone()
            })
            .ok_or_else(|| StratifyError::Api {
                status: 404,
                message: "Not found.".into(),
            })
    }

    async fn create_strategy(&self) -> Result<Strategy, StratifyError> {
        let mut state = self.enter("create_strategy".into(), "create_strategy")?;
        let owner = Self::signed_in_user(&state)?.id;
        let id = state.next_strategy_id;
        state.next_strategy_id += 1;
        let created = strategy(id, owner, vec![]);
        let created = Strategy {
            name: String::new(),
            exchange: String::new(),
            symbol: String::new(),
            ..created
        };
        state.strategies.insert(id, created.clone());
        Ok(created)
    }

    async fn update_strategy(&self, strategy: &Strategy) -> Result<Strategy, StratifyError> {
        let mut state = self.enter(format!("update_strategy:{}", strategy.id), "update_strategy")?;
        state.strategies.insert(strategy.id, strategy.clone());
        Ok(strategy.clone())
    }

    async fn clone_strategy(&self, id: u64) -> Result<Strategy, StratifyError> {
        let mut state = self.enter(format!("clone_strategy:{id}"), "clone_strategy")?;
        let owner = Self::signed_in_user(&state)?.id;
        let source = state
            .strategies
            .get(&id)
            .cloned()
            .ok_or_else(|| StratifyError::not_found("strategy", id))?;
        let new_id = state.next_strategy_id;
        state.next_strategy_id += 1;
        let copy = Strategy {
            id: new_id,
            user: Some(owner),
            clones_count: 0,
            ..source
        };
        state.strategies.insert(new_id, copy.clone());
        if let Some(s) = state.strategies.get_mut(&id) {
            s.clones_count += 1;
        }
        Ok(copy)
    }

    async fn delete_strategy(&self, id: u64) -> Result<(), StratifyError> {
        let mut state = self.enter(format!("delete_strategy:{id}"), "delete_strategy")?;
        state.strategies.remove(&id);
        Ok(())
    }

    async fn indicator(
        &self,
        strategy_id: u64,
        indicator_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Indicator, StratifyError> {
        let state = self.enter(format!("indicator:{indicator_id}"), "indicator")?;
        if state.failing_indicators.contains(indicator_id) {
            return Err(StratifyError::Api {
                status: 500,
                message: "A server error occurred.".into(),
            });
        }
        let stored = state
            .strategies
            .get(&strategy_id)
            .and_then(|s| s.indicator(indicator_id))
            .cloned()
            .ok_or_else(|| StratifyError::not_found("indicator", indicator_id))?;
        let candles: Vec<Candle> = state
            .candles
            .iter()
            .filter(|c| c.time >= start && c.time <= end)
            .cloned()
            .collect();
        Ok(with_data(&stored, &candles))
    }

    async fn executions(&self, strategy_id: u64) -> Result<Vec<StrategyExecution>, StratifyError> {
        let state = self.enter(format!("executions:{strategy_id}"), "executions")?;
        Ok(state.executions.get(&strategy_id).cloned().unwrap_or_default())
    }

    async fn execution(&self, id: u64) -> Result<StrategyExecution, StratifyError> {
        let mut state = self.enter(format!("execution:{id}"), "execution")?;
        if let Some(generations) = &state.supersede_on_poll {
            generations.advance();
        }
        if let Some(replies) = state.execution_replies.get_mut(&id) {
            let reply = if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            };
            if let Some(reply) = reply {
                return Ok(reply);
            }
        }
        state
            .executions
            .values()
            .flatten()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| StratifyError::not_found("execution", id))
    }

    async fn start_execution(&self, request: &StartExecution) -> Result<StrategyExecution, StratifyError> {
        let mut state = self.enter(format!("start_execution:{}", request.strategy), "start_execution")?;
        state.started.push(request.clone());
        let id = 500 + state.started.len() as u64;
        let mut created = execution(id, true, vec![]);
        created.strategy = Some(request.strategy);
        created.execution_type = request.execution_type;
        created.initial_tradable_value = request.initial_tradable_value;
        created.leverage = request.leverage;
        created.order_conditions = request.order_conditions.clone();
        state
            .executions
            .entry(request.strategy)
            .or_default()
            .insert(0, created.clone());
        Ok(created)
    }

    async fn stop_execution(&self, id: u64) -> Result<StrategyExecution, StratifyError> {
        let mut state = self.enter(format!("stop_execution:{id}"), "stop_execution")?;
        let found = state
            .executions
            .values_mut()
            .flatten()
            .find(|e| e.id == id)
            .ok_or_else(|| StratifyError::not_found("execution", id))?;
        found.running = false;
        Ok(found.clone())
    }

    async fn delete_execution(&self, id: u64) -> Result<(), StratifyError> {
        let mut state = self.enter(format!("delete_execution:{id}"), "delete_execution")?;
        for list in state.executions.values_mut() {
            list.retain(|e| e.id != id);
        }
        Ok(())
    }

    async fn dashboard(&self, query: &DashboardQuery) -> Result<DashboardStats, StratifyError> {
        let mut state = self.enter(format!("dashboard:{}", query.real_trading), "dashboard")?;
        state.dashboard_queries.push(query.clone());
        Ok(state.dashboard.clone())
    }
}

/// Remembers every notice.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.title).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.lock().unwrap().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

// Fixtures

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Hourly candles from `t0`, gently oscillating around 100.
pub fn candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let base = 100.0 + (i % 10) as f64;
            let up = i % 2 == 0;
            Candle {
                time: t0() + Duration::hours(i as i64),
                open: if up { base } else { base + 1.0 },
                high: base + 2.0,
                low: base - 1.0,
                close: if up { base + 1.0 } else { base },
                volume: 1_000.0 + i as f64,
            }
        })
        .collect()
}

pub fn user(id: u64, username: &str) -> User {
    User {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        dark_theme: false,
        timezone: "UTC".into(),
        dashboard_real_trading: false,
    }
}

pub fn indicator(id: &str, short_name: &str, params: &[(&str, f64)]) -> Indicator {
    Indicator {
        id: id.to_string(),
        name: short_name.to_lowercase(),
        short_name: short_name.to_string(),
        params: params
            .iter()
            .map(|(k, v)| IndicatorParam::new(k, *v))
            .collect(),
        data: None,
    }
}

pub fn sma(id: &str) -> Indicator {
    indicator(id, "SMA", &[("timeperiod", 20.0)])
}

pub fn rsi(id: &str) -> Indicator {
    indicator(
        id,
        "RSI",
        &[
            ("timeperiod", 14.0),
            ("upper_limit", 70.0),
            ("middle_limit", 50.0),
            ("lower_limit", 30.0),
        ],
    )
}

pub fn bbands(id: &str) -> Indicator {
    indicator(id, "BBANDS", &[("timeperiod", 20.0), ("nbdevup", 2.0), ("nbdevdn", 2.0)])
}

/// One point per candle, every output field set to the close.
pub fn with_data(indicator: &Indicator, candles: &[Candle]) -> Indicator {
    let fields = indicator.kind().output_fields();
    let data = candles
        .iter()
        .map(|c| {
            let values: BTreeMap<String, Value> = fields
                .iter()
                .map(|field| ((*field).to_string(), json!(c.close)))
                .collect();
            IndicatorPoint { time: c.time, values }
        })
        .collect();
    Indicator {
        data: Some(data),
        ..indicator.clone()
    }
}

pub fn strategy(id: u64, owner: u64, indicators: Vec<Indicator>) -> Strategy {
    Strategy {
        id,
        name: format!("Strategy {id}"),
        exchange: "binance".into(),
        symbol: "BTC/USDT".into(),
        timeframe: "1h".into(),
        start_date: Some(t0()),
        end_date: Some(t0() + Duration::days(30)),
        indicators,
        user: Some(owner),
        is_public: true,
        clones_count: 0,
    }
}

pub fn trade(id: u64, side: &str, hours: i64, abs_profit: Option<f64>) -> Trade {
    let value: Value = json!({
        "id": id,
        "timestamp": (t0() + Duration::hours(hours)).to_rfc3339(),
        "type": "market",
        "side": side,
        "price": "101.5",
        "amount": 0.5,
        "abs_profit": abs_profit,
    });
    serde_json::from_value(value).unwrap()
}

pub fn execution(id: u64, running: bool, trades: Vec<Trade>) -> StrategyExecution {
    let value = json!({
        "id": id,
        "strategy": 1,
        "type": "backtest",
        "running": running,
        "initial_tradable_value": 1000,
        "leverage": 1,
        "order_conditions": "[]",
        "trades": [],
    });
    let mut e: StrategyExecution = serde_json::from_value(value).unwrap();
    e.trades = trades;
    e
}

pub fn chart(notifier: Arc<RecordingNotifier>) -> CandleChart<HeadlessChart> {
    CandleChart::new(HeadlessChart::new(), notifier, chrono_tz::UTC)
}
