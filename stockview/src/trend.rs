//! Trend value formatting and the badge panel shown under metric charts.

use serde::{Deserialize, Serialize};

use crate::payload::TrendSeries;

pub const PERCENT_UNIT: &str = "percent";

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendUnit {
    Percent,
    #[default]
    Number,
}

impl TrendUnit {
    /// Anything other than `percent` (including no value) is a plain number.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(PERCENT_UNIT) => TrendUnit::Percent,
            _ => TrendUnit::Number,
        }
    }
}

/// Display string for a trend value, or `None` when the entry must be hidden.
pub fn format_trend(value: Option<f64>, unit: TrendUnit) -> Option<String> {
    let value = value.filter(|v| v.is_finite())?;
    let scaled = match unit {
        TrendUnit::Percent => value * 100.0,
        TrendUnit::Number => value,
    };
    if !scaled.is_finite() {
        return None;
    }
    // Negative zero prints as "0.00"; small negatives keep their sign.
    let scaled = if scaled == 0.0 { 0.0 } else { scaled };
    let text = format!("{:.2}", scaled);
    Some(match unit {
        TrendUnit::Percent => format!("{text}%"),
        TrendUnit::Number => text,
    })
}

/// Sort key for period labels: every digit of the label read as one integer,
/// so `"2024"`, `"Q1 2024"` and `"10y"` all order numerically.
pub fn recency_key(label: &str) -> u64 {
    let digits: String = label.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        0
    } else {
        digits.parse().unwrap_or(u64::MAX)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
}

impl Tone {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Tone::Positive
        } else if value < 0.0 {
            Tone::Negative
        } else {
            Tone::Neutral
        }
    }

    /// Extra CSS class on top of [`TrendBadge::BASE_CLASS`].
    pub fn class(self) -> Option<&'static str> {
        match self {
            Tone::Positive => Some("positive"),
            Tone::Negative => Some("negative"),
            Tone::Neutral => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrendBadge {
    pub label: String,
    pub display: String,
    pub tone: Tone,
}

impl TrendBadge {
    pub const BASE_CLASS: &'static str = "trend-badge";

    pub fn text(&self) -> String {
        format!("{}: {}", self.label, self.display)
    }
}

/// Badges in display order: most recent first, unformattable entries dropped.
pub fn trend_badges(series: &TrendSeries, unit: TrendUnit) -> Vec<TrendBadge> {
    let mut entries: Vec<(&str, f64)> = series
        .iter()
        .filter_map(|(label, value)| value.filter(|v| !v.is_nan()).map(|v| (label, v)))
        .collect();
    entries.sort_by(|a, b| recency_key(b.0).cmp(&recency_key(a.0)));
    entries
        .into_iter()
        .filter_map(|(label, value)| {
            let display = format_trend(Some(value), unit)?;
            Some(TrendBadge {
                label: label.to_string(),
                display,
                tone: Tone::of(value),
            })
        })
        .collect()
}

/// The container the badges are drawn into.
pub trait BadgeSurface {
    fn clear(&mut self);
    fn set_visible(&mut self, visible: bool);
    fn append(&mut self, badge: &TrendBadge);
}

/// Redraw the panel for `trend`. `None` resets it to empty and hidden. The
/// panel is only made visible when at least one badge was appended; returns
/// the number appended.
pub fn show_trend<S>(surface: &mut S, trend: Option<&TrendSeries>, unit: TrendUnit) -> usize
where
    S: BadgeSurface + ?Sized,
{
    surface.clear();
    surface.set_visible(false);
    let Some(series) = trend else {
        return 0;
    };
    let badges = trend_badges(series, unit);
    for badge in &badges {
        surface.append(badge);
    }
    if !badges.is_empty() {
        surface.set_visible(true);
    }
    badges.len()
}
