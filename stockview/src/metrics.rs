//! Metric cards: a click opens the shared chart modal for that metric.

use tracing::debug;

use crate::chart::{ChartBackend, ChartKind, ChartSlot, ChartSpec};
use crate::markup::{ATTR_CHART_TYPE, ATTR_METRIC, ATTR_TITLE, ATTR_TREND_KEY, ATTR_TREND_UNITS};
use crate::payload::{MetricSeries, TrendMap};
use crate::trend::{show_trend, BadgeSurface, TrendUnit};

/// Per-card settings read from the card's data attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct CardConfig {
    pub metric: String,
    pub kind: ChartKind,
    pub title: String,
    pub trend_key: Option<String>,
    pub trend_unit: TrendUnit,
}

impl CardConfig {
    /// `attr` looks up a data attribute by its full name. Returns `None` when a
    /// required attribute is missing or empty, or the chart type is unknown.
    pub fn from_attributes<F>(attr: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| attr(name).filter(|v| !v.is_empty());
        let metric = present(ATTR_METRIC)?;
        let kind_raw = present(ATTR_CHART_TYPE)?;
        let title = present(ATTR_TITLE)?;
        let Some(kind) = ChartKind::parse(&kind_raw) else {
            debug!("card {metric:?} has unsupported chart type {kind_raw:?}");
            return None;
        };
        Some(Self {
            metric,
            kind,
            title,
            trend_key: present(ATTR_TREND_KEY),
            trend_unit: TrendUnit::parse(attr(ATTR_TREND_UNITS).as_deref()),
        })
    }
}

pub trait ModalSurface {
    fn set_title(&mut self, title: &str);
    fn set_open(&mut self, open: bool);
}

/// The chart modal shared by every metric card: one chart slot, one badge
/// panel, one modal.
pub struct MetricExplorer<B, S, M>
where
    B: ChartBackend,
    S: BadgeSurface,
    M: ModalSurface,
{
    series: MetricSeries,
    trends: TrendMap,
    chart: ChartSlot<B>,
    badges: S,
    modal: M,
}

impl<B, S, M> MetricExplorer<B, S, M>
where
    B: ChartBackend,
    S: BadgeSurface,
    M: ModalSurface,
{
    pub fn new(series: MetricSeries, trends: TrendMap, chart: B, badges: S, modal: M) -> Self {
        Self {
            series,
            trends,
            chart: ChartSlot::new(chart),
            badges,
            modal,
        }
    }

    /// Show `card` in the modal, replacing whatever was shown before.
    pub fn open(&mut self, card: &CardConfig) {
        self.modal.set_title(&card.title);
        let spec = ChartSpec::metric(card.kind, &card.title, &card.metric, &self.series);
        self.chart.render(&spec);
        let trend = card.trend_key.as_deref().and_then(|key| self.trends.get(key));
        show_trend(&mut self.badges, trend, card.trend_unit);
        self.modal.set_open(true);
    }

    pub fn close(&mut self) {
        self.modal.set_open(false);
        show_trend(&mut self.badges, None, TrendUnit::Number);
    }

    pub fn chart(&self) -> &ChartSlot<B> {
        &self.chart
    }

    pub fn badges(&self) -> &S {
        &self.badges
    }

    pub fn modal(&self) -> &M {
        &self.modal
    }
}
