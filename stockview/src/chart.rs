//! Chart specs built from page data, and the slot that owns the single live
//! chart of a canvas.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::payload::{MetricSeries, ValuationResult};
use crate::ViewError;

pub const VALUATION_TITLE: &str = "Share Price";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

impl ChartKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "bar" => Some(ChartKind::Bar),
            "line" => Some(ChartKind::Line),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
        }
    }
}

/// Which family of chart the colors come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Palette {
    Metric,
    Valuation,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChartStyle {
    pub background: Rgba,
    pub border: Rgba,
    pub border_width: u32,
    pub border_radius: u32,
    pub tension: f64,
}

impl ChartStyle {
    pub fn for_kind(kind: ChartKind, palette: Palette) -> Self {
        let (background, border) = match (palette, kind) {
            (Palette::Metric, ChartKind::Bar) => {
                (Rgba::new(54, 162, 235, 0.6), Rgba::new(54, 162, 235, 1.0))
            }
            (Palette::Metric, ChartKind::Line) => {
                (Rgba::new(75, 192, 192, 0.6), Rgba::new(75, 192, 192, 1.0))
            }
            (Palette::Valuation, _) => (Rgba::new(52, 152, 219, 0.6), Rgba::new(41, 128, 185, 1.0)),
        };
        let (border_radius, tension) = match kind {
            ChartKind::Bar => (4, 0.0),
            ChartKind::Line => (0, 0.1),
        };
        Self {
            background,
            border,
            border_width: 1,
            border_radius,
            tension,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// A normalized dataset: only finite values, in display order.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub palette: Palette,
    pub title: String,
    pub points: Vec<ChartPoint>,
}

impl ChartSpec {
    pub fn new<I, S>(kind: ChartKind, palette: Palette, title: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<f64>)>,
        S: Into<String>,
    {
        let points = entries
            .into_iter()
            .filter_map(|(label, value)| {
                let value = value.filter(|v| v.is_finite())?;
                Some(ChartPoint {
                    label: label.into(),
                    value,
                })
            })
            .collect();
        Self {
            kind,
            palette,
            title: title.into(),
            points,
        }
    }

    /// One metric column over the historical years, in record order.
    pub fn metric(kind: ChartKind, title: &str, field: &str, series: &MetricSeries) -> Self {
        Self::new(kind, Palette::Metric, title, series.column(field))
    }

    /// Projected share prices sorted by numeric year. Labels without a
    /// leading number go last, in payload order.
    pub fn valuation(result: &ValuationResult) -> Self {
        let mut spec = Self::new(ChartKind::Bar, Palette::Valuation, VALUATION_TITLE, result.iter());
        let mut keyed: Vec<(Option<f64>, ChartPoint)> = spec
            .points
            .drain(..)
            .map(|p| (leading_float(&p.label), p))
            .collect();
        keyed.sort_by(|a, b| match (a.0, b.0) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        spec.points = keyed.into_iter().map(|(_, p)| p).collect();
        spec
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.label.as_str()).collect()
    }

    /// Values rounded to cents for display; the points keep full precision.
    pub fn display_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| round_cents(p.value)).collect()
    }

    pub fn style(&self) -> ChartStyle {
        ChartStyle::for_kind(self.kind, self.palette)
    }

    /// Chart.js configuration object for this dataset.
    pub fn to_chartjs(&self) -> JsonValue {
        let style = self.style();
        let axis = json!({
            "grid": { "display": false, "drawBorder": false },
            "ticks": { "font": { "family": "Roboto, sans-serif", "size": 12 } }
        });
        let mut y_axis = axis.clone();
        y_axis["beginAtZero"] = json!(true);
        json!({
            "type": self.kind.as_str(),
            "data": {
                "labels": self.labels(),
                "datasets": [{
                    "label": self.title,
                    "data": self.display_values(),
                    "backgroundColor": style.background.css(),
                    "borderColor": style.border.css(),
                    "borderWidth": style.border_width,
                    "borderRadius": style.border_radius,
                    "fill": false,
                    "tension": style.tension
                }]
            },
            "options": {
                "responsive": true,
                "plugins": {
                    "legend": { "display": false },
                    "tooltip": {
                        "backgroundColor": "#333",
                        "titleFont": { "size": 14 },
                        "bodyFont": { "size": 12 }
                    }
                },
                "scales": { "x": axis, "y": y_axis }
            }
        })
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Longest numeric prefix of `label`, read the way `parseFloat` reads it.
pub fn leading_float(label: &str) -> Option<f64> {
    let text = label.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    if text[end..].starts_with("Infinity") {
        let sign = if text.starts_with('-') { -1.0 } else { 1.0 };
        return Some(sign * f64::INFINITY);
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    text[..end].parse().ok()
}

/// Rendering target for a [`ChartSlot`].
pub trait ChartBackend {
    type Handle;

    /// Whether a chart could be drawn at all (canvas present, library loaded).
    fn ready(&self) -> Result<(), ViewError>;
    fn create(&mut self, spec: &ChartSpec) -> Result<Self::Handle, ViewError>;
    fn destroy(&mut self, handle: Self::Handle);
}

/// Owns at most one live chart. A new dataset always destroys the previous
/// chart before the replacement is created.
pub struct ChartSlot<B: ChartBackend> {
    backend: B,
    live: Option<B::Handle>,
}

impl<B: ChartBackend> ChartSlot<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, live: None }
    }

    /// Draw `spec`, replacing the current chart. Returns whether a chart was
    /// drawn; an empty spec or an unavailable backend leaves everything as is.
    pub fn render(&mut self, spec: &ChartSpec) -> bool {
        if spec.is_empty() {
            debug!("chart {:?} has no finite values; nothing drawn", spec.title);
            return false;
        }
        if let Err(err) = self.backend.ready() {
            warn!("{err}; chart {:?} skipped", spec.title);
            return false;
        }
        if let Some(previous) = self.live.take() {
            self.backend.destroy(previous);
        }
        match self.backend.create(spec) {
            Ok(handle) => {
                self.live = Some(handle);
                true
            }
            Err(err) => {
                warn!("failed to draw chart {:?}: {err}", spec.title);
                false
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.live.take() {
            self.backend.destroy(previous);
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every chart ever created and tracks how many are alive.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub unavailable: bool,
        pub created: Vec<ChartSpec>,
        pub live: usize,
        pub max_live: usize,
        next_id: usize,
    }

    impl ChartBackend for FakeBackend {
        type Handle = usize;

        fn ready(&self) -> Result<(), ViewError> {
            if self.unavailable {
                Err(ViewError::Chart("Chart.js is not loaded".into()))
            } else {
                Ok(())
            }
        }

        fn create(&mut self, spec: &ChartSpec) -> Result<usize, ViewError> {
            self.created.push(spec.clone());
            self.live += 1;
            self.max_live = self.max_live.max(self.live);
            self.next_id += 1;
            Ok(self.next_id)
        }

        fn destroy(&mut self, _handle: usize) {
            self.live -= 1;
        }
    }

    fn valuation(entries: &[(&str, Option<f64>)]) -> ValuationResult {
        ValuationResult::new(entries.iter().map(|(l, v)| (l.to_string(), *v)).collect())
    }

    #[test]
    fn filters_non_finite_and_keeps_order() {
        let spec = ChartSpec::new(
            ChartKind::Line,
            Palette::Metric,
            "Revenue",
            vec![("2024", Some(3.0)), ("2021", Some(f64::NAN)), ("2022", None), ("2020", Some(1.234))],
        );
        assert_eq!(spec.labels(), vec!["2024", "2020"]);
        assert_eq!(spec.display_values(), vec![3.0, 1.23]);
        assert_eq!(spec.points[1].value, 1.234);
    }

    #[test]
    fn valuation_sorts_by_numeric_year() {
        let spec = ChartSpec::valuation(&valuation(&[
            ("10", Some(5.0)),
            ("2", Some(3.0)),
            ("TV", Some(9.0)),
            ("1", Some(1.0)),
            ("2.5E", Some(4.0)),
            ("3", None),
        ]));
        assert_eq!(spec.labels(), vec!["1", "2", "2.5E", "10", "TV"]);
        assert_eq!(spec.kind, ChartKind::Bar);
        assert_eq!(spec.title, VALUATION_TITLE);
    }

    #[test]
    fn leading_float_matches_parse_float() {
        assert_eq!(leading_float("2024"), Some(2024.0));
        assert_eq!(leading_float("  2024E"), Some(2024.0));
        assert_eq!(leading_float("-1.5e2x"), Some(-150.0));
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("7."), Some(7.0));
        assert_eq!(leading_float("1e"), Some(1.0));
        assert_eq!(leading_float("FY2024"), None);
        assert_eq!(leading_float("."), None);
        assert_eq!(leading_float("-Infinity"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn style_is_a_function_of_kind() {
        let bar = ChartStyle::for_kind(ChartKind::Bar, Palette::Metric);
        let line = ChartStyle::for_kind(ChartKind::Line, Palette::Metric);
        assert_eq!(bar.background.css(), "rgba(54, 162, 235, 0.6)");
        assert_eq!(bar.border.css(), "rgba(54, 162, 235, 1)");
        assert_eq!(line.tension, 0.1);
        assert_eq!(line.border_radius, 0);
        assert_eq!(bar, ChartStyle::for_kind(ChartKind::Bar, Palette::Metric));
    }

    #[test]
    fn chartjs_config_carries_rounded_values() {
        let spec = ChartSpec::new(ChartKind::Bar, Palette::Metric, "EPS", vec![("2023", Some(1.005_1))]);
        let config = spec.to_chartjs();
        assert_eq!(config["type"], "bar");
        assert_eq!(config["data"]["labels"][0], "2023");
        assert_eq!(config["data"]["datasets"][0]["label"], "EPS");
        assert_eq!(config["data"]["datasets"][0]["data"][0], 1.01);
        assert_eq!(config["options"]["scales"]["y"]["beginAtZero"], true);
        assert!(config["options"]["scales"]["x"].get("beginAtZero").is_none());
    }

    #[test]
    fn slot_destroys_before_creating() {
        let mut slot = ChartSlot::new(FakeBackend::default());
        let first = ChartSpec::new(ChartKind::Bar, Palette::Metric, "A", vec![("2023", Some(1.0))]);
        let second = ChartSpec::new(ChartKind::Line, Palette::Metric, "B", vec![("2023", Some(2.0))]);
        assert!(slot.render(&first));
        assert!(slot.render(&second));
        assert!(slot.render(&first));
        assert_eq!(slot.backend().live, 1);
        assert_eq!(slot.backend().max_live, 1);
        assert_eq!(slot.backend().created.len(), 3);
        slot.clear();
        assert_eq!(slot.backend().live, 0);
        assert!(!slot.is_live());
    }

    #[test]
    fn empty_or_unavailable_is_a_no_op() {
        let mut slot = ChartSlot::new(FakeBackend::default());
        let drawn = ChartSpec::new(ChartKind::Bar, Palette::Metric, "A", vec![("2023", Some(1.0))]);
        let empty = ChartSpec::new(ChartKind::Bar, Palette::Metric, "B", vec![("2023", None::<f64>)]);
        assert!(slot.render(&drawn));
        assert!(!slot.render(&empty));
        assert!(slot.is_live());
        assert_eq!(slot.backend().created.len(), 1);

        let mut missing = ChartSlot::new(FakeBackend {
            unavailable: true,
            ..FakeBackend::default()
        });
        assert!(!missing.render(&drawn));
        assert!(missing.backend().created.is_empty());
    }
}
