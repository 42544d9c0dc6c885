use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ViewError;

/// Id of the optional embedded JSON payload that overrides [`ViewConfig`].
pub const CONFIG_PAYLOAD_ID: &str = "view-config";

/// Element ids, selectors and endpoints shared between the server templates
/// and the page scripts. Every field defaults to the markup the server
/// currently renders, so an override payload only needs the fields it changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    pub historical_metrics_payload: String,
    pub trend_payload: String,
    pub valuation_payload: String,
    pub transcripts_payload: String,

    pub metric_canvas: String,
    pub valuation_canvas: String,
    pub modal: String,
    pub modal_title: String,
    pub modal_close_selector: String,
    pub trend_badges: String,
    pub card_selector: String,

    pub valuation_panel: String,
    pub valuation_form: String,
    pub loading: String,
    pub loading_form_selector: String,

    pub tab_button_selector: String,
    pub tab_content_selector: String,

    pub transcript_select: String,
    pub transcript_content: String,
    pub summary_content: String,
    pub summary_button: String,
    pub ticker_input: String,

    pub summary_endpoint: String,
    pub requested_with: String,
    pub log_level: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            historical_metrics_payload: "historical-metrics-data".to_string(),
            trend_payload: "metric-trends-data".to_string(),
            valuation_payload: "dcf-results-data".to_string(),
            transcripts_payload: "transcripts-data".to_string(),
            metric_canvas: "metricChart".to_string(),
            valuation_canvas: "dcfChart".to_string(),
            modal: "chartModal".to_string(),
            modal_title: "chartTitle".to_string(),
            modal_close_selector: ".close-modal".to_string(),
            trend_badges: "trendBadges".to_string(),
            card_selector: ".card.clickable".to_string(),
            valuation_panel: "dcf-tab".to_string(),
            valuation_form: "dcf-form".to_string(),
            loading: "loading".to_string(),
            loading_form_selector: "form[data-loading-target]".to_string(),
            tab_button_selector: ".tablink".to_string(),
            tab_content_selector: ".tabcontent".to_string(),
            transcript_select: "transcript-select".to_string(),
            transcript_content: "transcript-content".to_string(),
            summary_content: "summary-content".to_string(),
            summary_button: "generate-summary".to_string(),
            ticker_input: "transcript-ticker".to_string(),
            summary_endpoint: "/compute_summary".to_string(),
            requested_with: "XMLHttpRequest".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ViewConfig {
    /// Parse an override payload, rejecting it as a whole when it is not a
    /// JSON object of known fields.
    pub fn from_json(text: &str) -> Result<Self, ViewError> {
        let config: ViewConfig =
            serde_json::from_str(text).map_err(|e| ViewError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the page config; falls back to the defaults when the payload is
    /// absent or invalid.
    pub fn from_payload(text: Option<&str>) -> Self {
        match text.map(str::trim).filter(|t| !t.is_empty()) {
            None => Self::default(),
            Some(text) => Self::from_json(text).unwrap_or_else(|err| {
                warn!("ignoring #{CONFIG_PAYLOAD_ID}: {err}");
                Self::default()
            }),
        }
    }

    /// `#id` selector for the valuation form, used inside a replaced panel.
    pub fn valuation_form_selector(&self) -> String {
        format!("#{}", self.valuation_form)
    }

    fn validate(&self) -> Result<(), ViewError> {
        let ids = [
            ("valuation_panel", &self.valuation_panel),
            ("valuation_form", &self.valuation_form),
            ("summary_endpoint", &self.summary_endpoint),
        ];
        for (name, value) in ids {
            if value.trim().is_empty() {
                return Err(ViewError::Config(format!("{name} must not be empty")));
            }
        }
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(()),
            other => Err(ViewError::Config(format!("unknown log level {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let config = ViewConfig::from_payload(Some(r#"{"summary_endpoint": "/api/summary"}"#));
        assert_eq!(config.summary_endpoint, "/api/summary");
        assert_eq!(config.valuation_panel, "dcf-tab");
        assert_eq!(config.valuation_form_selector(), "#dcf-form");
    }

    #[test]
    fn invalid_override_falls_back() {
        assert_eq!(ViewConfig::from_payload(Some("{not json")), ViewConfig::default());
        assert_eq!(
            ViewConfig::from_payload(Some(r#"{"log_level": "loud"}"#)),
            ViewConfig::default()
        );
        assert_eq!(
            ViewConfig::from_payload(Some(r#"{"valuation_panel": " "}"#)),
            ViewConfig::default()
        );
        assert_eq!(ViewConfig::from_payload(Some("   ")), ViewConfig::default());
    }
}
