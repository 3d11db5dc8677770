//! Multi-pane candlestick chart kept in sync with a strategy's indicators.
//!
//! Each indicator id moves through [`IndicatorState`]. [`CandleChart::reconcile`]
//! compares the strategy's indicator list with what is drawn, removes stale
//! indicators and hands back the fetches to run. Results come back through
//! [`CandleChart::complete_fetch`] in any order; the fetched indicators are
//! released as one [`IndicatorCommit`] only after every fetch of the batch has
//! settled, successfully or not.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::domain::candle::Candle;
use crate::domain::chart::legend::{candle_entry, indicator_entry, pane_overlay};
use crate::domain::chart::pane::PaneLayout;
use crate::domain::chart::series::{DOWN_COLOR, Placement, SeriesPlan, UP_COLOR, plan_for};
use crate::domain::chart::theme::{ChartTheme, CssVariables, Rgb, ThemeWatcher};
use crate::domain::error::StratifyError;
use crate::domain::execution::Trade;
use crate::domain::format::format_number;
use crate::domain::indicator::Indicator;
use crate::domain::strategy::Strategy;
use crate::domain::timezone::to_chart_seconds;
use crate::domain::user::Theme;
use crate::ports::chart_port::{
    CandlePoint, ChartSurface, Marker, MarkerPosition, MarkerShape, PaneOverlay, PriceFormat,
    SeriesData, SeriesId, SeriesOptions, SeriesStyle, ValuePoint,
};
use crate::ports::notify_port::{Notice, Notifier};

const VOLUME_ALPHA: f64 = 0.5;
const VOLUME_MARGINS: (f64, f64) = (0.8, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    Absent,
    PendingFetch,
    Displayed,
    Hidden,
    Removed,
}

/// Data request for one indicator over the loaded candle range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub strategy_id: u64,
    pub indicator_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Candle load the request belongs to; results from older loads are dropped.
    epoch: u64,
}

/// What one reconcile pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub removed: Vec<String>,
    pub fetches: Vec<FetchRequest>,
    /// Fetches were still in flight, nothing was touched.
    pub deferred: bool,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.fetches.is_empty()
    }
}

/// Fetched indicators, with data, to merge into the owning strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorCommit {
    pub indicators: Vec<Indicator>,
}

struct DisplayedIndicator {
    indicator: Indicator,
    plan: SeriesPlan,
    series: Vec<(SeriesId, Vec<ValuePoint>)>,
    visible: bool,
}

pub struct CandleChart<S: ChartSurface> {
    surface: S,
    notifier: Arc<dyn Notifier>,
    tz: Tz,
    candles: Vec<Candle>,
    candle_times: Vec<i64>,
    price_series: Vec<SeriesId>,
    layout: PaneLayout,
    displayed: HashMap<String, DisplayedIndicator>,
    in_flight: BTreeSet<String>,
    batch: Vec<Indicator>,
    failed: HashSet<String>,
    unsupported: HashSet<String>,
    removed: HashSet<String>,
    last_desired: BTreeSet<String>,
    epoch: u64,
    trades: Vec<Trade>,
    crosshair: Option<i64>,
    editable: bool,
    theme: Option<ChartTheme>,
    watcher: ThemeWatcher,
    disposed: bool,
}

impl<S: ChartSurface> CandleChart<S> {
    pub fn new(surface: S, notifier: Arc<dyn Notifier>, tz: Tz) -> Self {
        Self {
            surface,
            notifier,
            tz,
            candles: Vec::new(),
            candle_times: Vec::new(),
            price_series: Vec::new(),
            layout: PaneLayout::new(),
            displayed: HashMap::new(),
            in_flight: BTreeSet::new(),
            batch: Vec::new(),
            failed: HashSet::new(),
            unsupported: HashSet::new(),
            removed: HashSet::new(),
            last_desired: BTreeSet::new(),
            epoch: 0,
            trades: Vec::new(),
            crosshair: None,
            editable: false,
            theme: None,
            watcher: ThemeWatcher::new(),
            disposed: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn layout(&self) -> &PaneLayout {
        &self.layout
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Backdrop color for legends under the current theme.
    pub fn muted_opacity(&self) -> Option<&str> {
        self.theme.as_ref().map(|t| t.muted_opacity.as_str())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn state(&self, indicator_id: &str) -> IndicatorState {
        if self.in_flight.contains(indicator_id) {
            IndicatorState::PendingFetch
        } else if let Some(d) = self.displayed.get(indicator_id) {
            if d.visible {
                IndicatorState::Displayed
            } else {
                IndicatorState::Hidden
            }
        } else if self.removed.contains(indicator_id) {
            IndicatorState::Removed
        } else {
            IndicatorState::Absent
        }
    }

    /// Whether legend rows offer edit and delete actions.
    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
        self.refresh_overlays();
    }

    /// Replaces the candle set. Drawn indicators are dropped and results of
    /// fetches started for the previous candles are ignored.
    pub fn load_candles(&mut self, candles: &[Candle]) {
        self.clear_surface();
        self.layout.clear();
        self.displayed.clear();
        self.in_flight.clear();
        self.batch.clear();
        self.failed.clear();
        self.removed.clear();
        self.last_desired.clear();
        self.epoch += 1;
        self.candles = candles.to_vec();
        self.draw_candles();
        self.refresh_overlays();
    }

    /// Redraws candles and indicators in `tz` from the data already held.
    pub fn set_timezone(&mut self, tz: Tz) {
        if tz == self.tz {
            return;
        }
        self.tz = tz;
        self.redraw();
    }

    /// Removes displayed indicators missing from `strategy` and starts
    /// fetches for the ones not yet drawn. Does nothing while a batch is
    /// still in flight or before candles are loaded.
    pub fn reconcile(&mut self, strategy: &Strategy) -> Reconciliation {
        if !self.in_flight.is_empty() {
            return Reconciliation {
                deferred: true,
                ..Reconciliation::default()
            };
        }
        let (Some(first), Some(last)) = (self.candles.first(), self.candles.last()) else {
            return Reconciliation::default();
        };
        let (start, end) = (first.time, last.time);

        let desired = strategy.indicator_ids();
        let desired_set: BTreeSet<String> = desired.iter().cloned().collect();
        if desired_set != self.last_desired {
            self.failed.clear();
            self.last_desired = desired_set;
        }

        let mut stale: Vec<String> = self
            .displayed
            .keys()
            .filter(|id| !desired.contains(*id))
            .cloned()
            .collect();
        stale.sort();
        let mut removed = Vec::new();
        for id in stale {
            if self.take_down(&id) {
                removed.push(id);
            }
        }

        let mut fetches = Vec::new();
        for id in desired {
            if self.displayed.contains_key(&id)
                || self.unsupported.contains(&id)
                || self.failed.contains(&id)
            {
                continue;
            }
            self.removed.remove(&id);
            self.in_flight.insert(id.clone());
            fetches.push(FetchRequest {
                strategy_id: strategy.id,
                indicator_id: id,
                start,
                end,
                epoch: self.epoch,
            });
        }
        if !fetches.is_empty() || !removed.is_empty() {
            tracing::debug!(
                strategy_id = strategy.id,
                fetches = fetches.len(),
                removed = removed.len(),
                "reconciled chart indicators"
            );
        }
        Reconciliation {
            removed,
            fetches,
            deferred: false,
        }
    }

    /// Settles one fetch. Returns the batch once the last in-flight fetch has
    /// settled; stale or unknown requests are ignored.
    pub fn complete_fetch(
        &mut self,
        request: &FetchRequest,
        result: Result<Indicator, StratifyError>,
    ) -> Option<IndicatorCommit> {
        if request.epoch != self.epoch || !self.in_flight.remove(&request.indicator_id) {
            tracing::debug!(indicator_id = %request.indicator_id, "dropping stale indicator result");
            return None;
        }

        match result {
            Ok(mut indicator) => {
                if indicator.id.is_empty() {
                    indicator.id = request.indicator_id.clone();
                }
                match plan_for(&indicator) {
                    Ok(plan) => {
                        self.display(indicator.clone(), plan);
                        self.batch.push(indicator);
                    }
                    Err(err) => {
                        tracing::warn!(short_name = %indicator.short_name, "no series mapping for indicator");
                        self.unsupported.insert(request.indicator_id.clone());
                        self.notifier.notify(Notice::new(&err.user_message()));
                    }
                }
            }
            Err(err) => {
                tracing::warn!(indicator_id = %request.indicator_id, error = %err, "indicator fetch failed");
                self.failed.insert(request.indicator_id.clone());
                self.notifier
                    .notify(Notice::failure("Failed to get indicator", &err));
            }
        }

        if self.in_flight.is_empty() {
            self.refresh_overlays();
            Some(IndicatorCommit {
                indicators: std::mem::take(&mut self.batch),
            })
        } else {
            None
        }
    }

    /// Flips an indicator's visibility; returns the new visibility.
    pub fn toggle_visibility(&mut self, indicator_id: &str) -> Result<bool, StratifyError> {
        let d = self
            .displayed
            .get_mut(indicator_id)
            .ok_or_else(|| StratifyError::not_found("indicator", indicator_id))?;
        d.visible = !d.visible;
        let visible = d.visible;
        for (series, _) in &d.series {
            self.surface.set_series_visible(*series, visible);
        }
        self.refresh_overlays();
        Ok(visible)
    }

    /// Takes an indicator off the chart. The next reconcile fetches it
    /// again if the strategy still lists it.
    pub fn remove(&mut self, indicator_id: &str) -> bool {
        let removed = self.take_down(indicator_id);
        if removed {
            self.refresh_overlays();
        }
        removed
    }

    /// Forgets everything known about an indicator so the next reconcile
    /// fetches it again. A drawn indicator is taken down first. Unsupported
    /// kinds stay unsupported.
    pub fn invalidate(&mut self, indicator_id: &str) {
        if self.take_down(indicator_id) {
            self.refresh_overlays();
        }
        self.failed.remove(indicator_id);
        self.removed.remove(indicator_id);
    }

    pub fn move_pane_up(&mut self, pane: usize) -> Result<usize, StratifyError> {
        let target = self.layout.move_up(pane)?;
        self.surface.swap_panes(pane, target);
        self.refresh_overlays();
        Ok(target)
    }

    pub fn move_pane_down(&mut self, pane: usize) -> Result<usize, StratifyError> {
        let target = self.layout.move_down(pane)?;
        self.surface.swap_panes(pane, target);
        self.refresh_overlays();
        Ok(target)
    }

    /// Crosshair moved to `time` (chart seconds), or left the chart.
    pub fn set_crosshair(&mut self, time: Option<i64>) {
        self.crosshair = time;
        self.refresh_overlays();
    }

    /// Buy and sell markers for `trades` on the candle series.
    pub fn set_trades(&mut self, trades: &[Trade]) {
        self.trades = trades.to_vec();
        self.apply_markers();
    }

    pub fn apply_theme(&mut self, vars: &CssVariables) -> Result<(), StratifyError> {
        let theme = ChartTheme::from_css(vars)?;
        self.surface.apply_options(&theme.options);
        self.theme = Some(theme);
        self.refresh_overlays();
        Ok(())
    }

    /// Reapplies options when `theme` differs from the last one seen.
    pub fn on_theme_change(&mut self, theme: Theme, vars: &CssVariables) -> Result<bool, StratifyError> {
        if self.watcher.observe(theme).is_none() {
            return Ok(false);
        }
        self.apply_theme(vars)?;
        Ok(true)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }

    /// Overlays for every pane, top to bottom.
    pub fn overlays(&self) -> Vec<PaneOverlay> {
        (0..self.layout.len())
            .map(|pane| {
                let mut entries = Vec::new();
                if pane == 0 {
                    if let Some(candle) = self.candle_under_crosshair() {
                        entries.push(candle_entry(candle));
                    }
                }
                for id in self.layout.occupants(pane) {
                    if let Some(d) = self.displayed.get(id) {
                        let series: Vec<&[ValuePoint]> =
                            d.series.iter().map(|(_, points)| points.as_slice()).collect();
                        entries.push(indicator_entry(
                            id,
                            &d.indicator.legend_label(),
                            &series,
                            self.crosshair,
                            d.visible,
                            self.editable,
                        ));
                    }
                }
                pane_overlay(pane, entries, &self.layout)
            })
            .collect()
    }

    pub fn dispose(&mut self) {
        if !self.disposed {
            self.surface.dispose();
            self.disposed = true;
        }
    }

    fn candle_under_crosshair(&self) -> Option<&Candle> {
        self.crosshair
            .and_then(|t| self.candle_times.iter().position(|&ct| ct == t))
            .and_then(|i| self.candles.get(i))
            .or_else(|| self.candles.last())
    }

    fn display(&mut self, indicator: Indicator, plan: SeriesPlan) {
        let pane = match plan.placement {
            Placement::Overlay => 0,
            Placement::NewPane => self.layout.len(),
        };
        let series = self.draw_indicator(&indicator, &plan, pane, true);
        self.layout.place(&indicator.id, plan.placement);
        self.displayed.insert(
            indicator.id.clone(),
            DisplayedIndicator {
                indicator,
                plan,
                series,
                visible: true,
            },
        );
    }

    fn draw_indicator(
        &mut self,
        indicator: &Indicator,
        plan: &SeriesPlan,
        pane: usize,
        visible: bool,
    ) -> Vec<(SeriesId, Vec<ValuePoint>)> {
        let mut drawn = Vec::with_capacity(plan.series.len());
        for planned in &plan.series {
            let points = planned.points(indicator, &self.tz);
            let mut options = planned.options();
            options.visible = visible;
            let id = self
                .surface
                .add_series(pane, &options, SeriesData::Values(points.clone()));
            drawn.push((id, points));
        }
        if let Some((first, _)) = drawn.first() {
            for line in plan.price_lines() {
                self.surface.add_price_line(*first, &line);
            }
        }
        drawn
    }

    /// Removes series and, when it empties, the pane.
    fn take_down(&mut self, indicator_id: &str) -> bool {
        let Some(d) = self.displayed.remove(indicator_id) else {
            return false;
        };
        for (series, _) in &d.series {
            self.surface.remove_series(*series);
        }
        if let Some(removal) = self.layout.remove(indicator_id) {
            if removal.pane_removed {
                self.surface.remove_pane(removal.pane);
            }
        }
        self.removed.insert(indicator_id.to_string());
        true
    }

    fn clear_surface(&mut self) {
        for d in self.displayed.values() {
            for (series, _) in &d.series {
                self.surface.remove_series(*series);
            }
        }
        for series in self.price_series.drain(..) {
            self.surface.remove_series(series);
        }
        for pane in (1..self.surface.pane_count()).rev() {
            self.surface.remove_pane(pane);
        }
    }

    fn draw_candles(&mut self) {
        self.candle_times = self
            .candles
            .iter()
            .map(|c| to_chart_seconds(c.time, &self.tz))
            .collect();
        if self.candles.is_empty() {
            return;
        }

        let bars = self
            .candles
            .iter()
            .zip(&self.candle_times)
            .map(|(c, &time)| CandlePoint {
                time,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
            })
            .collect();
        let candle_options = SeriesOptions {
            style: SeriesStyle::Candlestick {
                up_color: UP_COLOR.to_string(),
                down_color: DOWN_COLOR.to_string(),
            },
            price_format: PriceFormat::FINE,
            overlay_margins: None,
            visible: true,
        };
        let candle_series = self
            .surface
            .add_series(0, &candle_options, SeriesData::Candles(bars));

        let faded = |color: &str| {
            Rgb::parse(color)
                .map(|c| c.with_alpha(VOLUME_ALPHA))
                .unwrap_or_else(|| color.to_string())
        };
        let (up, down) = (faded(UP_COLOR), faded(DOWN_COLOR));
        let volume = self
            .candles
            .iter()
            .zip(&self.candle_times)
            .map(|(c, &time)| ValuePoint {
                time,
                value: c.volume,
                color: Some(if c.close > c.open { up.clone() } else { down.clone() }),
            })
            .collect();
        let mut volume_options = SeriesOptions::histogram(&up);
        volume_options.price_format = PriceFormat::Volume;
        volume_options.overlay_margins = Some(VOLUME_MARGINS);
        let volume_series = self
            .surface
            .add_series(0, &volume_options, SeriesData::Values(volume));

        self.price_series = vec![candle_series, volume_series];
        self.apply_markers();
        self.surface.fit_content();
    }

    fn redraw(&mut self) {
        self.clear_surface();
        self.draw_candles();
        let mut panes: Vec<Vec<String>> = (0..self.layout.len())
            .map(|p| self.layout.occupants(p).to_vec())
            .collect();
        for (pane, ids) in panes.iter_mut().enumerate() {
            for id in ids.drain(..) {
                let Some(mut d) = self.displayed.remove(&id) else {
                    continue;
                };
                d.series = self.draw_indicator(&d.indicator, &d.plan, pane, d.visible);
                self.displayed.insert(id, d);
            }
        }
        self.refresh_overlays();
    }

    fn apply_markers(&mut self) {
        let Some(&candle_series) = self.price_series.first() else {
            return;
        };
        let mut markers: Vec<Marker> = self
            .trades
            .iter()
            .enumerate()
            .map(|(i, trade)| trade_marker(i + 1, trade, &self.tz))
            .collect();
        markers.sort_by_key(|m| m.time);
        self.surface.set_markers(candle_series, &markers);
    }

    fn refresh_overlays(&mut self) {
        for overlay in self.overlays() {
            self.surface.attach_overlay(&overlay);
        }
    }
}

impl<S: ChartSurface> Drop for CandleChart<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// `@3 +12.5` below the bar for buys, above for sells.
pub fn trade_marker(number: usize, trade: &Trade, tz: &Tz) -> Marker {
    let mut text = format!("@{number}");
    if let Some(profit) = trade.abs_profit {
        let sign = if profit > 0.0 { "+" } else { "" };
        text.push_str(&format!(" {sign}{}", format_number(profit)));
    }
    let (position, shape, color) = if trade.is_buy() {
        (MarkerPosition::BelowBar, MarkerShape::ArrowUp, UP_COLOR)
    } else {
        (MarkerPosition::AboveBar, MarkerShape::ArrowDown, DOWN_COLOR)
    };
    Marker {
        time: to_chart_seconds(trade.timestamp, tz),
        position,
        color: color.to_string(),
        shape,
        text,
    }
}
