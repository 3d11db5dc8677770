//! Compact decimal formatting for prices, volumes and percentages.

/// Leading fractional zeros at which a value switches to the `0.0{N}digits` form.
const COMPACT_ZERO_RUN: usize = 5;

/// Format a number for display.
///
/// Values with at least five leading fractional zeros collapse the run into
/// `0.0{N}digits`, where `N` is the run length minus one. Everything else is
/// rounded to 5 decimals when `|n| >= 1000` and to 8 otherwise, with trailing
/// zeros removed.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }

    let wide = trim_zeros(format!("{n:.12}"));
    if let Some(compact) = compact_form(&wide) {
        return compact;
    }

    let decimals = if n.abs() >= 1000.0 { 5 } else { 8 };
    let rounded = trim_zeros(format!("{n:.decimals$}"));
    if rounded == "-0" {
        "0".to_string()
    } else {
        rounded
    }
}

/// `1234567.0` -> `1.23 M`, `4321.0` -> `4.32 K`.
pub fn format_volume(v: f64) -> String {
    if v.abs() >= 1_000_000.0 {
        format!("{:.2} M", v / 1_000_000.0)
    } else if v.abs() >= 1_000.0 {
        format!("{:.2} K", v / 1_000.0)
    } else {
        format!("{v:.2}")
    }
}

/// Signed percentage with two decimals: `+1.25%`, `-0.40%`, `0.00%`.
pub fn format_percent(pct: f64) -> String {
    if pct > 0.0 {
        format!("+{pct:.2}%")
    } else {
        format!("{pct:.2}%")
    }
}

/// Like [`format_percent`] but renders a missing value as `-%`.
pub fn format_optional_percent(pct: Option<f64>) -> String {
    match pct {
        Some(p) => format_percent(p),
        None => "-%".to_string(),
    }
}

fn trim_zeros(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Matches `-?0.0{5,}\d+` and rewrites it.
fn compact_form(s: &str) -> Option<String> {
    let (sign, unsigned) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let fraction = unsigned.strip_prefix("0.")?;
    let zeros = fraction.bytes().take_while(|b| *b == b'0').count();
    let digits = &fraction[zeros..];
    if zeros < COMPACT_ZERO_RUN || digits.is_empty() {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{sign}0.0{{{}}}{digits}", zeros - 1))
}
