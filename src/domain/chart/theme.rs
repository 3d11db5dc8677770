//! Chart colors resolved from theme custom properties.
//!
//! Theme values are CSS colors in any of the forms a stylesheet uses: hex,
//! `rgb()`, `hsl()` or a bare `h s% l%` triple. They are normalized to
//! `rgb(r, g, b)` before reaching the chart.

use std::collections::HashMap;

use crate::domain::error::StratifyError;
use crate::domain::user::Theme;
use crate::ports::chart_port::{ChartOptions, CrosshairMode};

/// Alpha of the legend and menu backdrop derived from `--muted`.
pub const MUTED_OPACITY: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn parse(css: &str) -> Option<Rgb> {
        let s = css.trim().to_lowercase();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        match s.as_str() {
            "white" => return Some(Rgb { r: 255, g: 255, b: 255 }),
            "black" => return Some(Rgb { r: 0, g: 0, b: 0 }),
            _ => {}
        }
        if let Some(body) = function_body(&s, "rgb") {
            let parts = components(body);
            if parts.len() < 3 {
                return None;
            }
            let channel = |p: &str| p.parse::<f64>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
            return Some(Rgb {
                r: channel(parts[0])?,
                g: channel(parts[1])?,
                b: channel(parts[2])?,
            });
        }
        let body = function_body(&s, "hsl").unwrap_or(s.as_str());
        let parts = components(body);
        if parts.len() < 3 {
            return None;
        }
        let h = parts[0].trim_end_matches("deg").parse::<f64>().ok()?;
        let sat = percent(parts[1])?;
        let light = percent(parts[2])?;
        Some(hsl_to_rgb(h, sat, light))
    }

    pub fn to_css(self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    pub fn with_alpha(self, alpha: f64) -> String {
        format!("rgba({}, {}, {}, {alpha})", self.r, self.g, self.b)
    }
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let byte = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some(Rgb {
        r: byte(0)?,
        g: byte(2)?,
        b: byte(4)?,
    })
}

/// `rgba(1, 2, 3)` -> `1, 2, 3` for both `rgb` and `rgba` prefixes.
fn function_body<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(name)?;
    let rest = rest.strip_prefix('a').unwrap_or(rest);
    rest.trim().strip_prefix('(')?.strip_suffix(')')
}

/// Splits on commas, whitespace and the `/` alpha separator.
fn components(body: &str) -> Vec<&str> {
    body.split([',', ' ', '/'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn percent(p: &str) -> Option<f64> {
    let value = p.trim_end_matches('%').parse::<f64>().ok()?;
    Some((value / 100.0).clamp(0.0, 1.0))
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb {
    let h = h.rem_euclid(360.0) / 360.0;
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return Rgb { r: v, g: v, b: v };
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |t: f64| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgb {
        r: channel(h + 1.0 / 3.0),
        g: channel(h),
        b: channel(h - 1.0 / 3.0),
    }
}

/// Custom properties of the active theme, keyed with their leading `--`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssVariables {
    values: HashMap<String, String>,
}

impl CssVariables {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Built-in palette for `theme`.
    pub fn palette(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self::from_pairs([
                ("--background", "0 0% 100%"),
                ("--foreground", "222.2 84% 4.9%"),
                ("--muted", "210 40% 96.1%"),
                ("--muted-foreground", "215.4 16.3% 46.9%"),
                ("--border", "214.3 31.8% 91.4%"),
            ]),
            Theme::Dark => Self::from_pairs([
                ("--background", "222.2 84% 4.9%"),
                ("--foreground", "210 40% 98%"),
                ("--muted", "217.2 32.6% 17.5%"),
                ("--muted-foreground", "215 20.2% 65.1%"),
                ("--border", "217.2 32.6% 17.5%"),
            ]),
        }
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn color(&self, name: &str) -> Result<Rgb, StratifyError> {
        let raw = self
            .get(name)
            .ok_or_else(|| StratifyError::validation(name, "theme variable is not set"))?;
        Rgb::parse(raw)
            .ok_or_else(|| StratifyError::validation(name, format!("not a color: {raw}")))
    }
}

/// Options and derived colors for one theme.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartTheme {
    pub options: ChartOptions,
    /// Backdrop behind legend rows and pane menus.
    pub muted_opacity: String,
}

impl ChartTheme {
    pub fn from_css(vars: &CssVariables) -> Result<Self, StratifyError> {
        let foreground = vars.color("--foreground")?.to_css();
        let muted = vars.color("--muted")?;
        let border = vars.color("--border")?.to_css();
        let options = ChartOptions {
            text_color: foreground.clone(),
            background_top: muted.to_css(),
            background_bottom: vars.color("--background")?.to_css(),
            separator_color: border.clone(),
            grid_color: border.clone(),
            border_color: border,
            crosshair_color: vars.color("--muted-foreground")?.to_css(),
            crosshair_label_background: foreground,
            crosshair_mode: CrosshairMode::Normal,
            time_visible: true,
            seconds_visible: false,
            locale: "en".to_string(),
        };
        Ok(Self {
            options,
            muted_opacity: muted.with_alpha(MUTED_OPACITY),
        })
    }
}

/// Reports theme switches, the counterpart of watching the root class list.
#[derive(Debug, Clone, Default)]
pub struct ThemeWatcher {
    current: Option<Theme>,
}

impl ThemeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(theme)` when `theme` differs from the last observed one.
    pub fn observe(&mut self, theme: Theme) -> Option<Theme> {
        if self.current == Some(theme) {
            return None;
        }
        self.current = Some(theme);
        Some(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_color_forms() {
        let teal = Rgb { r: 46, g: 189, b: 133 };
        assert_eq!(Rgb::parse("#2EBD85"), Some(teal));
        assert_eq!(Rgb::parse("rgb(46, 189, 133)"), Some(teal));
        assert_eq!(Rgb::parse("rgba(46 189 133 / 0.5)"), Some(teal));
        assert_eq!(Rgb::parse("#fff"), Some(Rgb { r: 255, g: 255, b: 255 }));
        assert_eq!(Rgb::parse("0 0% 100%"), Some(Rgb { r: 255, g: 255, b: 255 }));
        assert_eq!(Rgb::parse("hsl(0, 100%, 50%)"), Some(Rgb { r: 255, g: 0, b: 0 }));
        assert_eq!(Rgb::parse("hsl(120 100% 25%)"), Some(Rgb { r: 0, g: 128, b: 0 }));
        assert_eq!(Rgb::parse("nonsense"), None);
        assert_eq!(Rgb::parse("#12345"), None);
    }

    #[test]
    fn css_output_forms() {
        let c = Rgb { r: 1, g: 2, b: 3 };
        assert_eq!(c.to_css(), "rgb(1, 2, 3)");
        assert_eq!(c.with_alpha(0.7), "rgba(1, 2, 3, 0.7)");
    }

    #[test]
    fn chart_theme_reads_palette() {
        let light = ChartTheme::from_css(&CssVariables::palette(Theme::Light)).unwrap();
        let dark = ChartTheme::from_css(&CssVariables::palette(Theme::Dark)).unwrap();
        assert_eq!(light.options.background_bottom, "rgb(255, 255, 255)");
        assert_ne!(light.options, dark.options);
        assert!(dark.muted_opacity.starts_with("rgba("));
        assert!(dark.muted_opacity.ends_with(", 0.7)"));
    }

    #[test]
    fn missing_variable_is_an_error() {
        let vars = CssVariables::from_pairs([("--foreground", "#000")]);
        assert!(ChartTheme::from_css(&vars).is_err());
    }

    #[test]
    fn watcher_reports_only_changes() {
        let mut watcher = ThemeWatcher::new();
        assert_eq!(watcher.observe(Theme::Dark), Some(Theme::Dark));
        assert_eq!(watcher.observe(Theme::Dark), None);
        assert_eq!(watcher.observe(Theme::Light), Some(Theme::Light));
    }
}
