//! Chart models driving a [`ChartSurface`](crate::ports::chart_port::ChartSurface).

pub mod candle_chart;
pub mod legend;
pub mod pane;
pub mod results;
pub mod series;
pub mod theme;

pub use candle_chart::{CandleChart, FetchRequest, IndicatorCommit, IndicatorState, Reconciliation};
pub use results::{ResultSeries, ResultsChart, ResultsMode};
