//! Execution results chart: cumulative profit, drawdown and buy-and-hold
//! profit, indexed by trade number.

use crate::domain::chart::theme::{ChartTheme, CssVariables, ThemeWatcher};
use crate::domain::error::StratifyError;
use crate::domain::execution::Trade;
use crate::domain::user::Theme;
use crate::ports::chart_port::{ChartSurface, SeriesData, SeriesId, SeriesOptions, ValuePoint};

const PROFIT_COLOR: &str = "#22AB94";
const LOSS_COLOR: &str = "#DD3240";
const HODLING_COLOR: &str = "#2962ff";
const DRAWDOWN_DARK: &str = "#2F104B";
const DRAWDOWN_LIGHT: &str = "#E3C4FF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultsMode {
    #[default]
    Percentage,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSeries {
    NetProfit,
    Drawdown,
    Hodling,
}

pub fn drawdown_color(theme: Theme) -> &'static str {
    if theme.is_dark() { DRAWDOWN_DARK } else { DRAWDOWN_LIGHT }
}

/// Trade-indexed points; trade `i` is plotted at `i + 1`.
fn indexed(values: impl Iterator<Item = Option<f64>>, color: impl Fn(f64) -> Option<String>) -> Vec<ValuePoint> {
    values
        .enumerate()
        .filter_map(|(i, v)| {
            v.map(|value| ValuePoint {
                time: i as i64 + 1,
                value,
                color: color(value),
            })
        })
        .collect()
}

pub struct ResultsChart<S: ChartSurface> {
    surface: S,
    theme: Theme,
    watcher: ThemeWatcher,
    mode: ResultsMode,
    trades: Vec<Trade>,
    series: Vec<(ResultSeries, SeriesId)>,
    hidden: Vec<ResultSeries>,
    disposed: bool,
}

impl<S: ChartSurface> ResultsChart<S> {
    pub fn new(surface: S, theme: Theme) -> Self {
        Self {
            surface,
            theme,
            watcher: ThemeWatcher::new(),
            mode: ResultsMode::default(),
            trades: Vec::new(),
            series: Vec::new(),
            hidden: Vec::new(),
            disposed: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn mode(&self) -> ResultsMode {
        self.mode
    }

    pub fn set_trades(&mut self, trades: &[Trade]) {
        self.trades = trades.to_vec();
        self.redraw();
    }

    pub fn set_mode(&mut self, mode: ResultsMode) {
        if mode != self.mode {
            self.mode = mode;
            self.redraw();
        }
    }

    /// Shows or hides one series; returns the new visibility.
    pub fn toggle(&mut self, which: ResultSeries) -> bool {
        let visible = if let Some(pos) = self.hidden.iter().position(|h| *h == which) {
            self.hidden.remove(pos);
            true
        } else {
            self.hidden.push(which);
            false
        };
        if let Some((_, id)) = self.series.iter().find(|(kind, _)| *kind == which) {
            self.surface.set_series_visible(*id, visible);
        }
        visible
    }

    pub fn on_theme_change(&mut self, theme: Theme, vars: &CssVariables) -> Result<bool, StratifyError> {
        if self.watcher.observe(theme).is_none() {
            return Ok(false);
        }
        let resolved = ChartTheme::from_css(vars)?;
        self.surface.apply_options(&resolved.options);
        self.theme = theme;
        self.redraw();
        Ok(true)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }

    pub fn dispose(&mut self) {
        if !self.disposed {
            self.surface.dispose();
            self.disposed = true;
        }
    }

    fn redraw(&mut self) {
        for (_, id) in self.series.drain(..) {
            self.surface.remove_series(id);
        }
        if self.trades.is_empty() {
            return;
        }
        let relative = self.mode == ResultsMode::Percentage;
        let pick = |rel: Option<f64>, abs: Option<f64>| if relative { rel } else { abs };

        let drawdown = indexed(
            self.trades.iter().map(|t| pick(t.rel_drawdown, t.abs_drawdown)),
            |_| None,
        );
        let net = indexed(
            self.trades.iter().map(|t| pick(t.rel_cum_profit, t.abs_cum_profit)),
            |v| Some((if v > 0.0 { PROFIT_COLOR } else { LOSS_COLOR }).to_string()),
        );
        let hodling = indexed(
            self.trades
                .iter()
                .map(|t| pick(t.rel_hodling_profit, t.abs_hodling_profit)),
            |_| None,
        );

        let plan = [
            (ResultSeries::Drawdown, SeriesOptions::histogram(drawdown_color(self.theme)), drawdown),
            (ResultSeries::NetProfit, SeriesOptions::line(PROFIT_COLOR), net),
            (ResultSeries::Hodling, SeriesOptions::line(HODLING_COLOR), hodling),
        ];
        for (kind, mut options, points) in plan {
            options.visible = !self.hidden.contains(&kind);
            let id = self.surface.add_series(0, &options, SeriesData::Values(points));
            self.series.push((kind, id));
        }
        self.surface.fit_content();
    }
}

impl<S: ChartSurface> Drop for ResultsChart<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
