//! Strategy executions, trades, performance metrics and market parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::StratifyError;
use crate::domain::order_condition::OrderCondition;
use crate::domain::strategy::{MarketType, Strategy, split_symbol};
use crate::domain::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    #[default]
    Backtest,
    Real,
}

impl std::fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionType::Backtest => write!(f, "backtest"),
            ExecutionType::Real => write!(f, "real"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(default, with = "wire::optional_number")]
    pub abs_net_profit: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub rel_net_profit: Option<f64>,
    #[serde(default)]
    pub total_closed_trades: Option<u64>,
    #[serde(default, with = "wire::optional_number")]
    pub winning_trade_rate: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub profit_factor: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub abs_avg_trade_profit: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub rel_avg_trade_profit: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub abs_max_run_up: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub rel_max_run_up: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub abs_max_drawdown: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub rel_max_drawdown: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    #[serde(with = "wire::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub order_type: String,
    #[serde(default)]
    pub side: String,
    #[serde(with = "wire::number")]
    pub price: f64,
    #[serde(with = "wire::number")]
    pub amount: f64,
    #[serde(default, with = "wire::optional_number")]
    pub cost: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub abs_profit: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub rel_profit: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub abs_cum_profit: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub rel_cum_profit: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub abs_hodling_profit: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub rel_hodling_profit: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub abs_runup: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub rel_runup: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub abs_drawdown: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub rel_drawdown: Option<f64>,
}

impl Trade {
    pub fn is_buy(&self) -> bool {
        self.side.eq_ignore_ascii_case("buy")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyExecution {
    pub id: u64,
    #[serde(default)]
    pub strategy: Option<u64>,
    #[serde(rename = "type", default)]
    pub execution_type: ExecutionType,
    #[serde(default)]
    pub running: bool,
    #[serde(default, with = "wire::number_or_zero")]
    pub maker_fee: f64,
    #[serde(default, with = "wire::number_or_zero")]
    pub taker_fee: f64,
    #[serde(default, with = "wire::number_or_zero")]
    pub initial_tradable_value: f64,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    #[serde(default, with = "wire::json_text")]
    pub order_conditions: Vec<OrderCondition>,
    #[serde(default, with = "wire::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    #[serde(default)]
    pub trades: Vec<Trade>,
}

fn default_leverage() -> u32 {
    1
}

impl StrategyExecution {
    /// One-line description used in execution pickers.
    pub fn label(&self) -> String {
        let status = if self.running { "running" } else { "finished" };
        let started = self
            .created_at
            .map(|t| format!(" {}", t.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        format!("#{} {} {status}{started}", self.id, self.execution_type)
    }
}

/// Fees and leverage limits for one market.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    #[serde(default, with = "wire::optional_number")]
    pub maker_fee: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub taker_fee: Option<f64>,
    #[serde(default)]
    pub max_leverage: Option<u32>,
    #[serde(default, with = "wire::optional_number")]
    pub price_precision: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub amount_precision: Option<f64>,
}

/// Body of a start-execution request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartExecution {
    pub strategy: u64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub initial_tradable_value: f64,
    pub leverage: u32,
    #[serde(rename = "type")]
    pub execution_type: ExecutionType,
    #[serde(with = "wire::json_text")]
    pub order_conditions: Vec<OrderCondition>,
}

/// Market parameters panel for a strategy: editable for a new run, frozen when
/// showing an existing execution.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketParams {
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub initial_tradable_value: f64,
    pub leverage: u32,
    pub execution_type: ExecutionType,
    pub max_leverage: Option<u32>,
    pub fees_locked: bool,
    pub read_only: bool,
    pub base_currency: String,
    pub quote_currency: String,
    pub market_type: MarketType,
}

impl MarketParams {
    /// Defaults for a new run, prefilled from market info when available.
    pub fn for_new_run(strategy: &Strategy, info: Option<&MarketInfo>) -> Self {
        let (base_currency, quote_currency) = split_symbol(&strategy.symbol);
        let info = info.cloned().unwrap_or_default();
        let fees_locked = matches!((info.maker_fee, info.taker_fee), (Some(m), Some(t)) if m != 0.0 && t != 0.0);
        Self {
            maker_fee: info.maker_fee.unwrap_or(0.0),
            taker_fee: info.taker_fee.unwrap_or(0.0),
            initial_tradable_value: 0.0,
            leverage: 1,
            execution_type: ExecutionType::Backtest,
            max_leverage: info.max_leverage,
            fees_locked,
            read_only: false,
            base_currency,
            quote_currency,
            market_type: MarketType::of_symbol(&strategy.symbol),
        }
    }

    pub fn for_execution(strategy: &Strategy, execution: &StrategyExecution) -> Self {
        let (base_currency, quote_currency) = split_symbol(&strategy.symbol);
        Self {
            maker_fee: execution.maker_fee,
            taker_fee: execution.taker_fee,
            initial_tradable_value: execution.initial_tradable_value,
            leverage: execution.leverage.max(1),
            execution_type: execution.execution_type,
            max_leverage: None,
            fees_locked: false,
            read_only: true,
            base_currency,
            quote_currency,
            market_type: MarketType::of_symbol(&strategy.symbol),
        }
    }

    pub fn allows_leverage(&self) -> bool {
        self.market_type == MarketType::Perpetual
    }

    fn ensure_editable(&self) -> Result<(), StratifyError> {
        if self.read_only {
            return Err(StratifyError::ReadOnly {
                reason: "market parameters of an existing execution cannot change".into(),
            });
        }
        Ok(())
    }

    pub fn set_fees(&mut self, maker_fee: f64, taker_fee: f64) -> Result<(), StratifyError> {
        self.ensure_editable()?;
        if self.fees_locked {
            return Err(StratifyError::ReadOnly {
                reason: "fees are provided by the exchange".into(),
            });
        }
        if maker_fee < 0.0 || taker_fee < 0.0 {
            return Err(StratifyError::validation("fee", "fees must be non-negative"));
        }
        self.maker_fee = maker_fee;
        self.taker_fee = taker_fee;
        Ok(())
    }

    pub fn set_initial_value(&mut self, value: f64) -> Result<(), StratifyError> {
        self.ensure_editable()?;
        if !value.is_finite() || value < 0.0 {
            return Err(StratifyError::validation(
                "initial_tradable_value",
                "initial tradable value must be non-negative",
            ));
        }
        self.initial_tradable_value = value;
        Ok(())
    }

    pub fn set_leverage(&mut self, leverage: u32) -> Result<(), StratifyError> {
        self.ensure_editable()?;
        if !self.allows_leverage() && leverage != 1 {
            return Err(StratifyError::validation(
                "leverage",
                "leverage is only available for perpetual markets",
            ));
        }
        if leverage == 0 || self.max_leverage.is_some_and(|max| leverage > max) {
            return Err(StratifyError::validation(
                "leverage",
                format!(
                    "leverage must be between 1 and {}",
                    self.max_leverage.unwrap_or(u32::MAX)
                ),
            ));
        }
        self.leverage = leverage;
        Ok(())
    }

    pub fn set_execution_type(&mut self, execution_type: ExecutionType) -> Result<(), StratifyError> {
        self.ensure_editable()?;
        self.execution_type = execution_type;
        Ok(())
    }

    /// Validate and build the start request. Real trading must be confirmed.
    pub fn start_request(
        &self,
        strategy_id: u64,
        order_conditions: Vec<OrderCondition>,
        confirmed: bool,
    ) -> Result<StartExecution, StratifyError> {
        self.ensure_editable()?;
        if self.initial_tradable_value <= 0.0 {
            return Err(StratifyError::validation(
                "initial_tradable_value",
                "initial tradable value must be positive",
            ));
        }
        if self.execution_type == ExecutionType::Real && !confirmed {
            return Err(StratifyError::validation(
                "type",
                "real trading must be confirmed before starting",
            ));
        }
        Ok(StartExecution {
            strategy: strategy_id,
            maker_fee: self.maker_fee,
            taker_fee: self.taker_fee,
            initial_tradable_value: self.initial_tradable_value,
            leverage: if self.allows_leverage() { self.leverage } else { 1 },
            execution_type: self.execution_type,
            order_conditions,
        })
    }
}

/// A recent trade on the dashboard, linked back to its execution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecentTrade {
    #[serde(default)]
    pub symbol: String,
    pub strategy_id: u64,
    pub strategy_execution_id: u64,
    #[serde(default)]
    pub strategy_name: String,
    #[serde(with = "wire::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub side: String,
    #[serde(default, with = "wire::optional_number")]
    pub rel_profit: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardStats {
    #[serde(default, with = "wire::optional_number")]
    pub total_net_profit: Option<f64>,
    #[serde(default)]
    pub total_closed_trades: Option<u64>,
    #[serde(default, with = "wire::optional_number")]
    pub winning_trade_rate: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub profit_factor: Option<f64>,
    #[serde(default, with = "wire::optional_number")]
    pub avg_trade_profit: Option<f64>,
    #[serde(default)]
    pub rel_cum_profit: Vec<f64>,
    #[serde(default)]
    pub recent_trades: Vec<RecentTrade>,
}
