//! Charting library port.
//!
//! A surface is a stack of panes, each holding series. Pane 0 is the price
//! pane. Adding a series to `pane_count()` opens a new pane at the bottom;
//! removing a pane shifts every pane below it up by one. All times are chart
//! seconds (local wall-clock time encoded as a Unix timestamp).

use std::fmt;

/// Handle to a series created on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesId(pub u64);

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "series#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dotted,
    Dashed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceFormat {
    /// Up to `precision` decimals, ticks of `min_move`.
    Price { precision: u32, min_move: f64 },
    Volume,
}

impl PriceFormat {
    pub const FINE: PriceFormat = PriceFormat::Price {
        precision: 10,
        min_move: 1e-10,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesStyle {
    Candlestick {
        up_color: String,
        down_color: String,
    },
    Line {
        color: String,
        width: u32,
        style: LineStyle,
    },
    Histogram {
        color: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesOptions {
    pub style: SeriesStyle,
    pub price_format: PriceFormat,
    /// Own price scale squeezed into `(top, bottom)` margins of the pane.
    pub overlay_margins: Option<(f64, f64)>,
    pub visible: bool,
}

impl SeriesOptions {
    pub fn line(color: &str) -> Self {
        Self {
            style: SeriesStyle::Line {
                color: color.to_string(),
                width: 1,
                style: LineStyle::Solid,
            },
            price_format: PriceFormat::FINE,
            overlay_margins: None,
            visible: true,
        }
    }

    pub fn histogram(color: &str) -> Self {
        Self {
            style: SeriesStyle::Histogram {
                color: color.to_string(),
            },
            price_format: PriceFormat::FINE,
            overlay_margins: None,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandlePoint {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuePoint {
    pub time: i64,
    pub value: f64,
    /// Per-point color override.
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesData {
    Candles(Vec<CandlePoint>),
    Values(Vec<ValuePoint>),
}

impl SeriesData {
    pub fn len(&self) -> usize {
        match self {
            SeriesData::Candles(points) => points.len(),
            SeriesData::Values(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Horizontal reference line attached to a series.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLine {
    pub price: f64,
    pub color: String,
    pub width: u32,
    pub style: LineStyle,
    pub axis_label_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPosition {
    AboveBar,
    BelowBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    ArrowUp,
    ArrowDown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub time: i64,
    pub position: MarkerPosition,
    pub color: String,
    pub shape: MarkerShape,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrosshairMode {
    Normal,
    Magnet,
}

/// Resolved layout and color options, reapplied on every theme change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub text_color: String,
    pub background_top: String,
    pub background_bottom: String,
    pub separator_color: String,
    pub grid_color: String,
    pub border_color: String,
    pub crosshair_color: String,
    pub crosshair_label_background: String,
    pub crosshair_mode: CrosshairMode,
    pub time_visible: bool,
    pub seconds_visible: bool,
    pub locale: String,
}

/// One row of a pane overlay: a label and colored values.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    /// `None` for the candle row.
    pub indicator_id: Option<String>,
    pub label: String,
    pub values: Vec<LegendValue>,
    pub visible: bool,
    /// Offer edit and delete actions.
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendValue {
    pub color: String,
    pub text: String,
}

/// Everything drawn on top of one pane.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneOverlay {
    pub pane: usize,
    pub entries: Vec<LegendEntry>,
    pub can_move_up: bool,
    pub can_move_down: bool,
}

pub trait ChartSurface {
    fn apply_options(&mut self, options: &ChartOptions);

    /// Opens a new pane when `pane == pane_count()`.
    fn add_series(&mut self, pane: usize, options: &SeriesOptions, data: SeriesData) -> SeriesId;

    fn remove_series(&mut self, series: SeriesId);

    fn set_series_visible(&mut self, series: SeriesId, visible: bool);

    fn add_price_line(&mut self, series: SeriesId, line: &PriceLine);

    fn set_markers(&mut self, series: SeriesId, markers: &[Marker]);

    /// Removes the pane and its series; later panes shift up.
    fn remove_pane(&mut self, pane: usize);

    fn swap_panes(&mut self, a: usize, b: usize);

    fn pane_count(&self) -> usize;

    /// Replaces the overlay drawn on `overlay.pane`.
    fn attach_overlay(&mut self, overlay: &PaneOverlay);

    fn resize(&mut self, width: u32, height: u32);

    fn fit_content(&mut self);

    fn dispose(&mut self);
}
