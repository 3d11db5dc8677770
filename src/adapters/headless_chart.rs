//! In-memory [`ChartSurface`] that records what would be drawn.
//!
//! Used by the terminal renderer and by tests. Unknown series ids and pane
//! indices are ignored, like a charting library ignoring a stale handle.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::ports::chart_port::{
    ChartOptions, ChartSurface, Marker, PaneOverlay, PriceLine, SeriesData, SeriesId, SeriesOptions,
    SeriesStyle,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSeries {
    pub pane: usize,
    pub options: SeriesOptions,
    pub data: SeriesData,
    pub price_lines: Vec<PriceLine>,
    pub markers: Vec<Marker>,
}

impl RecordedSeries {
    pub fn color(&self) -> &str {
        match &self.options.style {
            SeriesStyle::Candlestick { up_color, .. } => up_color,
            SeriesStyle::Line { color, .. } | SeriesStyle::Histogram { color } => color,
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(self.options.style, SeriesStyle::Line { .. })
    }
}

#[derive(Debug)]
pub struct HeadlessChart {
    next_id: u64,
    panes: usize,
    series: BTreeMap<SeriesId, RecordedSeries>,
    overlays: BTreeMap<usize, PaneOverlay>,
    options: Option<ChartOptions>,
    size: (u32, u32),
    fit_count: usize,
    disposed: bool,
}

impl Default for HeadlessChart {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessChart {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            panes: 1,
            series: BTreeMap::new(),
            overlays: BTreeMap::new(),
            options: None,
            size: (0, 0),
            fit_count: 0,
            disposed: false,
        }
    }

    pub fn series(&self, id: SeriesId) -> Option<&RecordedSeries> {
        self.series.get(&id)
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Series on `pane`, in creation order.
    pub fn series_in_pane(&self, pane: usize) -> Vec<&RecordedSeries> {
        self.series.values().filter(|s| s.pane == pane).collect()
    }

    pub fn price_line_count(&self) -> usize {
        self.series.values().map(|s| s.price_lines.len()).sum()
    }

    pub fn overlay(&self, pane: usize) -> Option<&PaneOverlay> {
        self.overlays.get(&pane)
    }

    pub fn options(&self) -> Option<&ChartOptions> {
        self.options.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn fit_count(&self) -> usize {
        self.fit_count
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Markers across all series.
    pub fn markers(&self) -> Vec<&Marker> {
        self.series.values().flat_map(|s| s.markers.iter()).collect()
    }

    /// One block per pane: its legend rows, then its series.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for pane in 0..self.panes {
            let _ = writeln!(out, "pane {pane}");
            if let Some(overlay) = self.overlays.get(&pane) {
                for entry in &overlay.entries {
                    let values: Vec<&str> = entry.values.iter().map(|v| v.text.as_str()).collect();
                    let hidden = if entry.visible { "" } else { " (hidden)" };
                    let _ = writeln!(out, "  {}{hidden} {}", entry.label, values.join(" "));
                }
            }
            for s in self.series_in_pane(pane) {
                let kind = match s.options.style {
                    SeriesStyle::Candlestick { .. } => "candles",
                    SeriesStyle::Line { .. } => "line",
                    SeriesStyle::Histogram { .. } => "histogram",
                };
                let _ = writeln!(
                    out,
                    "  - {kind} {} ({} points, {} price lines)",
                    s.color(),
                    s.data.len(),
                    s.price_lines.len()
                );
            }
        }
        out
    }
}

impl ChartSurface for HeadlessChart {
    fn apply_options(&mut self, options: &ChartOptions) {
        self.options = Some(options.clone());
    }

    fn add_series(&mut self, pane: usize, options: &SeriesOptions, data: SeriesData) -> SeriesId {
        let pane = if pane >= self.panes {
            self.panes += 1;
            self.panes - 1
        } else {
            pane
        };
        let id = SeriesId(self.next_id);
        self.next_id += 1;
        self.series.insert(
            id,
            RecordedSeries {
                pane,
                options: options.clone(),
                data,
                price_lines: Vec::new(),
                markers: Vec::new(),
            },
        );
        id
    }

    fn remove_series(&mut self, series: SeriesId) {
        self.series.remove(&series);
    }

    fn set_series_visible(&mut self, series: SeriesId, visible: bool) {
        if let Some(s) = self.series.get_mut(&series) {
            s.options.visible = visible;
        }
    }

    fn add_price_line(&mut self, series: SeriesId, line: &PriceLine) {
        if let Some(s) = self.series.get_mut(&series) {
            s.price_lines.push(line.clone());
        }
    }

    fn set_markers(&mut self, series: SeriesId, markers: &[Marker]) {
        if let Some(s) = self.series.get_mut(&series) {
            s.markers = markers.to_vec();
        }
    }

    fn remove_pane(&mut self, pane: usize) {
        if pane == 0 || pane >= self.panes {
            return;
        }
        self.series.retain(|_, s| s.pane != pane);
        for s in self.series.values_mut() {
            if s.pane > pane {
                s.pane -= 1;
            }
        }
        self.overlays = std::mem::take(&mut self.overlays)
            .into_iter()
            .filter(|(p, _)| *p != pane)
            .map(|(p, mut overlay)| {
                if p > pane {
                    overlay.pane = p - 1;
                }
                (overlay.pane, overlay)
            })
            .collect();
        self.panes -= 1;
    }

    fn swap_panes(&mut self, a: usize, b: usize) {
        if a >= self.panes || b >= self.panes || a == b {
            return;
        }
        for s in self.series.values_mut() {
            if s.pane == a {
                s.pane = b;
            } else if s.pane == b {
                s.pane = a;
            }
        }
    }

    fn pane_count(&self) -> usize {
        self.panes
    }

    fn attach_overlay(&mut self, overlay: &PaneOverlay) {
        if overlay.pane < self.panes {
            self.overlays.insert(overlay.pane, overlay.clone());
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn fit_content(&mut self) {
        self.fit_count += 1;
    }

    fn dispose(&mut self) {
        self.series.clear();
        self.overlays.clear();
        self.panes = 1;
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::chart_port::{LineStyle, ValuePoint};

    fn values(n: usize) -> SeriesData {
        SeriesData::Values(
            (0..n)
                .map(|i| ValuePoint {
                    time: i as i64,
                    value: i as f64,
                    color: None,
                })
                .collect(),
        )
    }

    #[test]
    fn adding_past_the_last_pane_opens_one() {
        let mut chart = HeadlessChart::new();
        chart.add_series(0, &SeriesOptions::line("blue"), values(3));
        let rsi = chart.add_series(1, &SeriesOptions::line("violet"), values(3));
        assert_eq!(chart.pane_count(), 2);
        assert_eq!(chart.series(rsi).unwrap().pane, 1);
    }

    #[test]
    fn removing_a_pane_shifts_later_panes_up() {
        let mut chart = HeadlessChart::new();
        let a = chart.add_series(1, &SeriesOptions::line("violet"), values(2));
        let b = chart.add_series(2, &SeriesOptions::line("blue"), values(2));
        chart.remove_pane(1);
        assert_eq!(chart.pane_count(), 2);
        assert!(chart.series(a).is_none());
        assert_eq!(chart.series(b).unwrap().pane, 1);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut chart = HeadlessChart::new();
        let line = PriceLine {
            price: 70.0,
            color: "grey".into(),
            width: 1,
            style: LineStyle::Dashed,
            axis_label_visible: true,
        };
        chart.add_price_line(SeriesId(99), &line);
        chart.remove_series(SeriesId(99));
        chart.remove_pane(0);
        chart.remove_pane(5);
        assert_eq!(chart.price_line_count(), 0);
        assert_eq!(chart.pane_count(), 1);
    }

    #[test]
    fn render_lists_panes_and_series() {
        let mut chart = HeadlessChart::new();
        chart.add_series(1, &SeriesOptions::histogram("#2EBD85"), values(4));
        let text = chart.render();
        assert!(text.contains("pane 0"));
        assert!(text.contains("pane 1\n  - histogram #2EBD85 (4 points, 0 price lines)"));
    }
}
