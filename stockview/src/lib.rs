//! Presentation logic for the stock analysis result page.
//!
//! Everything that does not need a live DOM lives here: payload decoding,
//! trend formatting, chart specs, the valuation exchange protocol and
//! transcript selection. The browser crate implements the small surface traits
//! declared in each module.

use thiserror::Error;

pub mod chart;
pub mod config;
pub mod exchange;
pub mod markup;
pub mod metrics;
pub mod payload;
pub mod tabs;
pub mod transcript;
pub mod trend;

pub use chart::{ChartBackend, ChartKind, ChartPoint, ChartSlot, ChartSpec, ChartStyle, Palette};
pub use config::ViewConfig;
pub use exchange::{
    decode_valuation_reply, ExchangePhase, PanelSwap, ValuationExchange, ValuationHost,
    ValuationUpdate,
};
pub use metrics::{CardConfig, MetricExplorer, ModalSurface};
pub use payload::{
    MetricRecord, MetricSeries, PagePayloads, SpeakerTurn, TranscriptRecord, TrendMap,
    TrendSeries, ValuationResult,
};
pub use tabs::{activate_tab, TabSet, TabState, TabSurface};
pub use transcript::{decode_summary_reply, SummaryRequest, SummaryTicket, SummaryView, TranscriptSelector};
pub use trend::{format_trend, recency_key, show_trend, BadgeSurface, Tone, TrendBadge, TrendUnit};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("payload #{id} is malformed: {reason}")]
    Payload { id: String, reason: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server reported an error: {0}")]
    Server(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("element #{0} not found")]
    MissingAnchor(String),
    #[error("chart unavailable: {0}")]
    Chart(String),
    #[error("invalid view config: {0}")]
    Config(String),
}
