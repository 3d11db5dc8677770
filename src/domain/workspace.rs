//! The strategy editor: one strategy, its candle chart, its order
//! conditions and its executions.
//!
//! Indicator fetches for one reconcile pass run concurrently on a
//! [`JoinSet`]; their results are fed back to the chart in completion order
//! and the strategy's indicator list is updated once, when the chart
//! releases the batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Duration;

use crate::domain::candle::CandleQuery;
use crate::domain::chart::{CandleChart, FetchRequest, Reconciliation};
use crate::domain::error::StratifyError;
use crate::domain::execution::{ExecutionType, MarketInfo, MarketParams, StrategyExecution};
use crate::domain::indicator::{Indicator, IndicatorParam, new_from_catalog};
use crate::domain::order_condition::{OrderCondition, OrderConditionBuilder};
use crate::domain::polling::{ExecutionPoller, Generation, GenerationCounter, POLL_INTERVAL, PollOutcome};
use crate::domain::routes::{PORTAL_PATH, StrategyLink};
use crate::domain::strategy::Strategy;
use crate::ports::api_port::StratifyApi;
use crate::ports::chart_port::ChartSurface;
use crate::ports::navigation_port::Navigator;
use crate::ports::notify_port::{Notice, Notifier, reported};

/// Editable strategy fields. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyChanges {
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_public: Option<bool>,
}

impl StrategyChanges {
    fn touches_market(&self) -> bool {
        self.exchange.is_some()
            || self.symbol.is_some()
            || self.timeframe.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
    }

    fn apply(&self, strategy: &mut Strategy) -> Result<(), StratifyError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(StratifyError::validation("name", "Name cannot be empty"));
            }
            strategy.name = name.trim().to_string();
        }
        if let Some(exchange) = &self.exchange {
            if *exchange != strategy.exchange {
                strategy.symbol.clear();
            }
            strategy.exchange = exchange.clone();
        }
        if let Some(symbol) = &self.symbol {
            strategy.symbol = symbol.clone();
        }
        if let Some(timeframe) = &self.timeframe {
            strategy.timeframe = timeframe.clone();
        }
        if self.start_date.is_some() {
            strategy.start_date = self.start_date;
        }
        if self.end_date.is_some() {
            strategy.end_date = self.end_date;
        }
        if let (Some(start), Some(end)) = (strategy.start_date, strategy.end_date) {
            if start >= end {
                return Err(StratifyError::validation("start_date", "Start date must be before end date"));
            }
        }
        if let Some(public) = self.is_public {
            strategy.is_public = public;
        }
        Ok(())
    }
}

pub struct StrategyWorkspace<S: ChartSurface> {
    api: Arc<dyn StratifyApi>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    strategy: Strategy,
    chart: CandleChart<S>,
    user_id: Option<u64>,
    market_info: Option<MarketInfo>,
    executions: Vec<StrategyExecution>,
    selected: Option<u64>,
    draft_conditions: Vec<OrderCondition>,
    builder: OrderConditionBuilder,
    generations: GenerationCounter,
    poll_interval: Duration,
}

impl<S: ChartSurface> StrategyWorkspace<S> {
    /// Loads the strategy, its executions and market info, then the candles
    /// and indicators.
    pub async fn open(
        api: Arc<dyn StratifyApi>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        chart: CandleChart<S>,
        strategy_id: u64,
        user_id: Option<u64>,
    ) -> Result<Self, StratifyError> {
        let strategy = reported(
            notifier.as_ref(),
            "Failed to get strategy",
            api.strategy(strategy_id).await,
        )?;
        let executions = if strategy.is_owned_by(user_id) {
            reported(
                notifier.as_ref(),
                "Failed to get strategy executions",
                api.executions(strategy_id).await,
            )?
        } else {
            Vec::new()
        };

        let mut workspace = Self {
            api,
            notifier,
            navigator,
            strategy,
            chart,
            user_id,
            market_info: None,
            executions,
            selected: None,
            draft_conditions: Vec::new(),
            builder: OrderConditionBuilder::default(),
            generations: GenerationCounter::new(),
            poll_interval: POLL_INTERVAL,
        };
        workspace.rebuild_builder();
        workspace.chart.set_editable(workspace.is_owner());
        workspace.load_market_info().await;
        workspace.load_candles().await?;
        Ok(workspace)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn chart(&self) -> &CandleChart<S> {
        &self.chart
    }

    pub fn chart_mut(&mut self) -> &mut CandleChart<S> {
        &mut self.chart
    }

    pub fn executions(&self) -> &[StrategyExecution] {
        &self.executions
    }

    pub fn selected_execution(&self) -> Option<&StrategyExecution> {
        self.selected
            .and_then(|id| self.executions.iter().find(|e| e.id == id))
    }

    pub fn builder(&self) -> &OrderConditionBuilder {
        &self.builder
    }

    /// Edits made here are kept as the draft for the next run.
    pub fn builder_mut(&mut self) -> &mut OrderConditionBuilder {
        &mut self.builder
    }

    pub fn generations(&self) -> &GenerationCounter {
        &self.generations
    }

    pub fn is_owner(&self) -> bool {
        self.strategy.is_owned_by(self.user_id)
    }

    /// The deep link for the current view.
    pub fn link(&self) -> StrategyLink {
        let link = StrategyLink::new(self.strategy.id);
        match self.selected {
            Some(id) => link.with_execution(id),
            None => link,
        }
    }

    /// Parameters for the run form: the selected execution's, read-only, or
    /// defaults for a new run.
    pub fn market_params(&self) -> MarketParams {
        match self.selected_execution() {
            Some(execution) => MarketParams::for_execution(&self.strategy, execution),
            None => MarketParams::for_new_run(&self.strategy, self.market_info.as_ref()),
        }
    }

    /// Fetches candles for the strategy's market and range and redraws the
    /// chart. Strategies without a complete market load nothing.
    pub async fn load_candles(&mut self) -> Result<(), StratifyError> {
        let Some(query) = self.candle_query() else {
            tracing::debug!(strategy_id = self.strategy.id, "strategy has no market yet");
            self.chart.load_candles(&[]);
            return Ok(());
        };
        let set = reported(
            self.notifier.as_ref(),
            "Failed to get candles",
            self.api.candles(&query).await,
        )?;
        if let Some(notice) = set.truncation_notice() {
            self.notifier
                .notify(Notice::new("Candles truncated").with_description(notice));
        }
        tracing::info!(strategy_id = self.strategy.id, candles = set.len(), "candles loaded");
        self.chart.load_candles(&set.candles);
        self.apply_selected_trades();
        self.sync_indicators().await;
        Ok(())
    }

    /// Brings the chart in line with the strategy's indicator list and
    /// merges the fetched data back into the strategy.
    pub async fn sync_indicators(&mut self) -> Reconciliation {
        let reconciliation = self.chart.reconcile(&self.strategy);
        if reconciliation.fetches.is_empty() {
            return reconciliation;
        }

        let mut tasks = JoinSet::new();
        for (slot, request) in reconciliation.fetches.iter().enumerate() {
            let api = Arc::clone(&self.api);
            let request = request.clone();
            tasks.spawn(async move {
                let result = api
                    .indicator(request.strategy_id, &request.indicator_id, request.start, request.end)
                    .await;
                (slot, result)
            });
        }

        let mut settled = vec![false; reconciliation.fetches.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, result)) => {
                    settled[slot] = true;
                    self.settle(&reconciliation.fetches[slot], result);
                }
                Err(err) => tracing::error!(error = %err, "indicator fetch task failed"),
            }
        }
        for (request, done) in reconciliation.fetches.iter().zip(settled) {
            if !done {
                let aborted = StratifyError::Transport {
                    reason: "indicator request was aborted".into(),
                };
                self.settle(request, Err(aborted));
            }
        }
        reconciliation
    }

    fn settle(&mut self, request: &FetchRequest, result: Result<Indicator, StratifyError>) {
        if let Some(commit) = self.chart.complete_fetch(request, result) {
            tracing::debug!(count = commit.indicators.len(), "merging fetched indicators");
            self.strategy.merge_indicators(commit.indicators);
        }
    }

    /// Adds an indicator from the catalog and returns its id.
    pub async fn add_indicator(&mut self, short_name: &str) -> Result<String, StratifyError> {
        self.ensure_owner()?;
        let indicator = new_from_catalog(short_name, &self.strategy.indicators).ok_or_else(|| {
            self.invalid(StratifyError::validation(
                "indicator",
                format!("Unknown indicator {short_name}"),
            ))
        })?;
        let id = indicator.id.clone();
        let mut next = self.strategy.clone();
        next.indicators.push(indicator);
        self.save_indicators(next, "Failed to add indicator").await?;
        self.sync_indicators().await;
        Ok(id)
    }

    pub async fn remove_indicator(&mut self, indicator_id: &str) -> Result<(), StratifyError> {
        self.ensure_owner()?;
        if self.strategy.indicator(indicator_id).is_none() {
            return Err(self.invalid(StratifyError::not_found("indicator", indicator_id)));
        }
        let mut next = self.strategy.clone();
        next.indicators.retain(|i| i.id != indicator_id);
        self.save_indicators(next, "Failed to delete indicator").await?;
        self.sync_indicators().await;
        Ok(())
    }

    /// Stores new parameters and redraws the indicator. Returns false when
    /// nothing changed.
    pub async fn update_indicator(
        &mut self,
        indicator_id: &str,
        params: Vec<IndicatorParam>,
    ) -> Result<bool, StratifyError> {
        self.ensure_owner()?;
        let Some(current) = self.strategy.indicator(indicator_id) else {
            return Err(self.invalid(StratifyError::not_found("indicator", indicator_id)));
        };
        let updated = Indicator {
            params,
            data: None,
            ..current.clone()
        };
        if current.same_params(&updated) {
            return Ok(false);
        }
        let mut next = self.strategy.clone();
        for slot in next.indicators.iter_mut() {
            if slot.id == indicator_id {
                *slot = updated.clone();
            }
        }
        self.save_indicators(next, "Failed to update indicator").await?;
        self.chart.invalidate(indicator_id);
        self.sync_indicators().await;
        Ok(true)
    }

    pub fn toggle_indicator(&mut self, indicator_id: &str) -> Result<bool, StratifyError> {
        self.chart.toggle_visibility(indicator_id)
    }

    /// Applies field changes; a market or range change reloads candles.
    pub async fn update_details(&mut self, changes: &StrategyChanges) -> Result<(), StratifyError> {
        self.ensure_owner()?;
        let mut next = self.strategy.clone();
        changes.apply(&mut next).map_err(|e| self.invalid(e))?;
        let reply = self.api.update_strategy(&next.for_update()).await;
        let saved = reported(self.notifier.as_ref(), "Failed to update strategy", reply)?;
        let previous = std::mem::replace(&mut self.strategy, next);
        self.strategy.user = saved.user.or(previous.user);
        self.strategy.clones_count = saved.clones_count;
        if changes.touches_market() {
            self.load_market_info().await;
            self.load_candles().await?;
        }
        Ok(())
    }

    pub async fn set_public(&mut self, public: bool) -> Result<(), StratifyError> {
        let changes = StrategyChanges {
            is_public: Some(public),
            ..StrategyChanges::default()
        };
        self.update_details(&changes).await
    }

    /// Clones the strategy and opens the copy.
    pub async fn clone_strategy(&self) -> Result<Strategy, StratifyError> {
        let reply = self.api.clone_strategy(self.strategy.id).await;
        let copy = reported(self.notifier.as_ref(), "Failed to clone strategy", reply)?;
        self.navigator.navigate(&StrategyLink::new(copy.id).to_path());
        Ok(copy)
    }

    pub async fn delete_strategy(&self) -> Result<(), StratifyError> {
        self.ensure_owner()?;
        let reply = self.api.delete_strategy(self.strategy.id).await;
        reported(self.notifier.as_ref(), "Failed to delete strategy", reply)?;
        self.navigator.navigate(PORTAL_PATH);
        Ok(())
    }

    /// Selects an execution, or returns to the draft with `None`. Any poll
    /// for the previous selection is superseded.
    pub fn select_execution(&mut self, execution_id: Option<u64>) -> Result<Generation, StratifyError> {
        if let Some(id) = execution_id {
            if !self.executions.iter().any(|e| e.id == id) {
                return Err(StratifyError::not_found("execution", id));
            }
        }
        if self.selected.is_none() && !self.builder.is_read_only() {
            self.draft_conditions = self.builder.blocks().to_vec();
        }
        self.selected = execution_id;
        let generation = self.generations.advance();
        self.rebuild_builder();
        self.apply_selected_trades();
        self.navigator.navigate(&self.link().to_path());
        Ok(generation)
    }

    /// Starts a run with the draft conditions. Real trading needs `confirmed`.
    pub async fn start_execution(
        &mut self,
        params: &MarketParams,
        confirmed: bool,
    ) -> Result<&StrategyExecution, StratifyError> {
        self.ensure_owner()?;
        if self.selected.is_some() {
            return Err(self.invalid(StratifyError::ReadOnly {
                reason: "Deselect the execution to start a new run".into(),
            }));
        }
        let request = params
            .start_request(self.strategy.id, self.builder.blocks().to_vec(), confirmed)
            .map_err(|e| self.invalid(e))?;
        let reply = self.api.start_execution(&request).await;
        let execution = reported(self.notifier.as_ref(), "Failed to start strategy", reply)?;
        tracing::info!(execution_id = execution.id, kind = %execution.execution_type, "execution started");
        let id = execution.id;
        self.executions.insert(0, execution);
        self.select_execution(Some(id))?;
        self.selected_execution()
            .ok_or_else(|| StratifyError::not_found("execution", id))
    }

    /// Stops the selected execution. Real trading needs `confirmed`.
    pub async fn stop_execution(&mut self, confirmed: bool) -> Result<&StrategyExecution, StratifyError> {
        self.ensure_owner()?;
        let Some(selected) = self.selected_execution() else {
            return Err(self.invalid(StratifyError::validation("execution", "No execution selected")));
        };
        if !selected.running {
            return Err(self.invalid(StratifyError::validation("execution", "Execution is not running")));
        }
        if selected.execution_type == ExecutionType::Real && !confirmed {
            return Err(self.invalid(StratifyError::validation(
                "type",
                "real trading must be confirmed before stopping",
            )));
        }
        let id = selected.id;
        let reply = self.api.stop_execution(id).await;
        let stopped = reported(self.notifier.as_ref(), "Failed to stop strategy", reply)?;
        self.apply_execution(stopped);
        self.selected_execution()
            .ok_or_else(|| StratifyError::not_found("execution", id))
    }

    pub async fn delete_execution(&mut self, execution_id: u64) -> Result<(), StratifyError> {
        self.ensure_owner()?;
        let reply = self.api.delete_execution(execution_id).await;
        reported(self.notifier.as_ref(), "Failed to delete execution", reply)?;
        self.executions.retain(|e| e.id != execution_id);
        if self.selected == Some(execution_id) {
            self.select_execution(None)?;
        }
        Ok(())
    }

    /// Detaches a watch on the selected execution. The watch owns its own
    /// handles, so the workspace stays free to change selection while it
    /// runs; updates arrive on the returned channel tagged with the
    /// generation they were polled under. `None` when nothing running is
    /// selected.
    pub fn watch_selected(&self) -> Option<(ExecutionWatch, PolledUpdates)> {
        let execution = self.selected_execution()?;
        if !execution.running {
            return None;
        }
        let (updates, rx) = mpsc::unbounded_channel();
        let watch = ExecutionWatch {
            poller: ExecutionPoller::new(Arc::clone(&self.api), self.generations.clone())
                .with_interval(self.poll_interval),
            notifier: Arc::clone(&self.notifier),
            execution_id: execution.id,
            generation: self.generations.current(),
            updates,
        };
        Some((watch, rx))
    }

    /// Applies a polled execution unless the selection moved on since it
    /// was requested. Returns whether it was applied.
    pub fn apply_polled(&mut self, generation: Generation, execution: StrategyExecution) -> bool {
        if !self.generations.is_current(generation) {
            tracing::debug!(execution_id = execution.id, "dropping superseded poll update");
            return false;
        }
        self.apply_execution(execution);
        true
    }

    /// Runs a watch on the selected execution to the end, applying each
    /// update as it arrives.
    pub async fn follow_selected(&mut self) -> Option<PollOutcome> {
        let (watch, mut updates) = self.watch_selected()?;
        let run = watch.run();
        tokio::pin!(run);
        let outcome = loop {
            tokio::select! {
                outcome = &mut run => break outcome,
                Some((generation, fresh)) = updates.recv() => {
                    self.apply_polled(generation, fresh);
                }
            }
        };
        while let Ok((generation, fresh)) = updates.try_recv() {
            self.apply_polled(generation, fresh);
        }
        Some(outcome)
    }

    /// Replaces the stored copy of an execution with a fresher one.
    pub fn apply_execution(&mut self, execution: StrategyExecution) {
        let selected = self.selected == Some(execution.id);
        match self.executions.iter_mut().find(|e| e.id == execution.id) {
            Some(slot) => *slot = execution,
            None => self.executions.insert(0, execution),
        }
        if selected {
            self.apply_selected_trades();
        }
    }

    fn candle_query(&self) -> Option<CandleQuery> {
        if !self.strategy.has_market() || self.strategy.timeframe.is_empty() {
            return None;
        }
        Some(CandleQuery {
            exchange: self.strategy.exchange.clone(),
            symbol: self.strategy.symbol.clone(),
            timeframe: self.strategy.timeframe.clone(),
            start: self.strategy.start_date?,
            end: self.strategy.end_date?,
        })
    }

    async fn load_market_info(&mut self) {
        self.market_info = None;
        if !self.strategy.has_market() {
            return;
        }
        match self
            .api
            .market_info(&self.strategy.exchange, &self.strategy.symbol)
            .await
        {
            Ok(info) => self.market_info = Some(info),
            Err(err) => {
                tracing::warn!(error = %err, symbol = %self.strategy.symbol, "market info unavailable");
            }
        }
    }

    async fn save_indicators(&mut self, next: Strategy, title: &str) -> Result<(), StratifyError> {
        let reply = self.api.update_strategy(&next.for_update()).await;
        reported(self.notifier.as_ref(), title, reply)?;
        self.strategy.indicators = next.indicators;
        Ok(())
    }

    fn rebuild_builder(&mut self) {
        self.builder = match self.selected_execution() {
            Some(execution) => OrderConditionBuilder::read_only(execution.order_conditions.clone()),
            None if self.is_owner() => OrderConditionBuilder::new(self.draft_conditions.clone()),
            None => OrderConditionBuilder::disabled(self.draft_conditions.clone()),
        };
    }

    fn apply_selected_trades(&mut self) {
        let trades = self
            .selected_execution()
            .map(|e| e.trades.clone())
            .unwrap_or_default();
        self.chart.set_trades(&trades);
    }

    fn ensure_owner(&self) -> Result<(), StratifyError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(self.invalid(StratifyError::ReadOnly {
                reason: "Only the owner can change this strategy".into(),
            }))
        }
    }

    fn invalid(&self, err: StratifyError) -> StratifyError {
        self.notifier.notify(Notice::new(&err.user_message()));
        err
    }
}

/// Receiving end of an [`ExecutionWatch`].
pub type PolledUpdates = mpsc::UnboundedReceiver<(Generation, StrategyExecution)>;

/// A poll of one execution, detached from the workspace that started it.
pub struct ExecutionWatch {
    poller: ExecutionPoller,
    notifier: Arc<dyn Notifier>,
    execution_id: u64,
    generation: Generation,
    updates: mpsc::UnboundedSender<(Generation, StrategyExecution)>,
}

impl ExecutionWatch {
    pub fn execution_id(&self) -> u64 {
        self.execution_id
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Polls until the execution finishes, the selection changes or a
    /// request fails. Failures other than an expired session are reported.
    pub async fn run(self) -> PollOutcome {
        let Self {
            poller,
            notifier,
            execution_id,
            generation,
            updates,
        } = self;
        let outcome = poller
            .watch(execution_id, generation, |fresh| {
                // receiver gone means nobody is applying updates any more
                let _ = updates.send((generation, fresh));
            })
            .await;
        if let PollOutcome::Failed(err) = &outcome {
            if !matches!(err, StratifyError::Unauthorized) {
                notifier.notify(Notice::failure("Failed to get strategy execution", err));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> Strategy {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Cross",
            "exchange": "binance",
            "symbol": "BTC/USDT",
            "timeframe": "1h",
            "user": 3
        }))
        .unwrap()
    }

    #[test]
    fn changing_exchange_clears_symbol() {
        let mut s = strategy();
        let changes = StrategyChanges {
            exchange: Some("kraken".into()),
            ..StrategyChanges::default()
        };
        changes.apply(&mut s).unwrap();
        assert_eq!(s.exchange, "kraken");
        assert!(s.symbol.is_empty());
        assert!(changes.touches_market());
    }

    #[test]
    fn rejects_blank_name_and_inverted_range() {
        let mut s = strategy();
        let blank = StrategyChanges {
            name: Some("  ".into()),
            ..StrategyChanges::default()
        };
        assert!(blank.apply(&mut s).is_err());

        let end = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let inverted = StrategyChanges {
            start_date: Some(end),
            end_date: Some(end - chrono::Duration::days(1)),
            ..StrategyChanges::default()
        };
        assert!(inverted.apply(&mut s).is_err());
    }

    #[test]
    fn renaming_does_not_touch_market() {
        let changes = StrategyChanges {
            name: Some("Other".into()),
            is_public: Some(true),
            ..StrategyChanges::default()
        };
        assert!(!changes.touches_market());
    }
}
