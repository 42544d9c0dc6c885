//! The asynchronous valuation (DCF) form exchange.
//!
//! A submit posts the form out of band; the server answers with a freshly
//! rendered valuation panel and the projected prices. The live panel is
//! swapped for the new one in place and the new form is bound in the same
//! step, since the replacement carries no event listeners of its own.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use crate::payload::ValuationResult;
use crate::ViewError;

#[derive(Debug, Default, Deserialize)]
struct ValuationReply {
    #[serde(default)]
    error: Option<JsonValue>,
    #[serde(default)]
    dcf_html: Option<JsonValue>,
    #[serde(default)]
    dcf_results: Option<JsonValue>,
}

/// JavaScript truthiness, which is what the server's replies are written against.
pub(crate) fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

pub(crate) fn error_message(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// What a successful reply asks the page to change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValuationUpdate {
    pub fragment: Option<String>,
    pub results: Option<ValuationResult>,
}

/// Decode a valuation reply body. A body that is not a JSON object, or that
/// carries a truthy `error`, is an error.
pub fn decode_valuation_reply(body: &str) -> Result<ValuationUpdate, ViewError> {
    let reply: ValuationReply =
        serde_json::from_str(body).map_err(|e| ViewError::MalformedResponse(e.to_string()))?;
    if let Some(err) = reply.error.as_ref().filter(|e| truthy(e)) {
        return Err(ViewError::Server(error_message(err)));
    }
    let fragment = match reply.dcf_html {
        Some(JsonValue::String(html)) if !html.is_empty() => Some(html),
        _ => None,
    };
    let results = reply
        .dcf_results
        .as_ref()
        .filter(|r| truthy(r))
        .and_then(ValuationResult::from_value);
    Ok(ValuationUpdate { fragment, results })
}

/// Result of swapping the live panel for the one in a reply fragment.
#[derive(Debug, PartialEq)]
pub enum PanelSwap<F> {
    /// The panel was replaced; `form` is the fresh form inside it, if any.
    Replaced { form: Option<F> },
    /// The fragment has no element with the panel's anchor id; nothing changed.
    AnchorMissing,
}

/// The page the exchange operates on.
pub trait ValuationHost {
    type Form;

    fn set_loading(&mut self, visible: bool);
    /// Parse `fragment`, find the panel anchor in it and put it in place of
    /// the live panel. Must not touch the page when the anchor is missing.
    fn swap_panel(&mut self, fragment: &str) -> Result<PanelSwap<Self::Form>, ViewError>;
    /// Attach the submit handler. Binding a form that is already bound is a no-op.
    fn bind_form(&mut self, form: Self::Form);
    fn render_valuation(&mut self, results: &ValuationResult);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExchangePhase {
    #[default]
    Idle,
    Submitting,
}

/// Apply a decoded reply: replace and rebind the panel, then redraw the chart.
pub fn apply_update<H: ValuationHost>(host: &mut H, update: ValuationUpdate) -> Result<(), ViewError> {
    if let Some(fragment) = update.fragment.as_deref() {
        match host.swap_panel(fragment)? {
            PanelSwap::Replaced { form: Some(form) } => host.bind_form(form),
            PanelSwap::Replaced { form: None } => {
                debug!("replacement panel has no form; later submissions are not intercepted");
            }
            PanelSwap::AnchorMissing => {
                warn!("valuation reply has no panel anchor; keeping the current panel");
                return Ok(());
            }
        }
    }
    if let Some(results) = update.results.as_ref() {
        host.render_valuation(results);
    }
    Ok(())
}

/// State of the single valuation form on the page.
#[derive(Debug, Default)]
pub struct ValuationExchange {
    phase: ExchangePhase,
    completed: u64,
}

impl ValuationExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// Number of exchanges that ran to completion, successful or not.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Start a submission. Returns `false` (and changes nothing) while a
    /// previous submission is still in flight.
    pub fn begin<H: ValuationHost>(&mut self, host: &mut H) -> bool {
        if self.phase == ExchangePhase::Submitting {
            debug!("valuation request already in flight; submit ignored");
            return false;
        }
        self.phase = ExchangePhase::Submitting;
        host.set_loading(true);
        true
    }

    /// Finish the in-flight submission with the raw reply body (or the
    /// transport failure). The loading indicator is hidden on every path and
    /// a failure leaves the current panel and chart as they were.
    pub fn complete<H: ValuationHost>(
        &mut self,
        host: &mut H,
        body: Result<String, ViewError>,
    ) -> Result<(), ViewError> {
        let outcome = body
            .and_then(|text| decode_valuation_reply(&text))
            .and_then(|update| apply_update(host, update));
        host.set_loading(false);
        self.phase = ExchangePhase::Idle;
        self.completed += 1;
        if let Err(err) = &outcome {
            error!("error computing DCF: {err}");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::tests::FakeBackend;
    use crate::chart::{ChartSlot, ChartSpec};

    const PANEL: &str = r#"id="dcf-tab""#;
    const FORM: &str = r#"id="dcf-form""#;

    #[derive(Default)]
    struct FakeForm {
        listeners: usize,
    }

    /// A page with one live valuation panel. Forms are addressed by index;
    /// the live one belongs to the current panel.
    struct FakePage {
        forms: Vec<FakeForm>,
        live_form: usize,
        panel_html: String,
        loading: bool,
        chart: ChartSlot<FakeBackend>,
    }

    impl FakePage {
        fn new() -> Self {
            Self {
                forms: vec![FakeForm::default()],
                live_form: 0,
                panel_html: "initial".to_string(),
                loading: false,
                chart: ChartSlot::new(FakeBackend::default()),
            }
        }

        /// Dispatch a submit on the live form: every listener starts an exchange.
        fn submit(&mut self, exchange: &mut ValuationExchange, reply: &str) -> usize {
            let listeners = self.forms[self.live_form].listeners;
            for _ in 0..listeners {
                if exchange.begin(self) {
                    assert!(self.loading);
                    let _ = exchange.complete(self, Ok(reply.to_string()));
                }
            }
            listeners
        }
    }

    impl ValuationHost for FakePage {
        type Form = usize;

        fn set_loading(&mut self, visible: bool) {
            self.loading = visible;
        }

        fn swap_panel(&mut self, fragment: &str) -> Result<PanelSwap<usize>, ViewError> {
            if fragment.contains("explode") {
                return Err(ViewError::MissingAnchor("dcf-tab".into()));
            }
            if !fragment.contains(PANEL) {
                return Ok(PanelSwap::AnchorMissing);
            }
            self.panel_html = fragment.to_string();
            if !fragment.contains(FORM) {
                return Ok(PanelSwap::Replaced { form: None });
            }
            self.forms.push(FakeForm::default());
            self.live_form = self.forms.len() - 1;
            Ok(PanelSwap::Replaced {
                form: Some(self.live_form),
            })
        }

        fn bind_form(&mut self, form: usize) {
            let form = &mut self.forms[form];
            if form.listeners == 0 {
                form.listeners = 1;
            }
        }

        fn render_valuation(&mut self, results: &ValuationResult) {
            self.chart.render(&ChartSpec::valuation(results));
        }
    }

    fn success_reply(marker: &str) -> String {
        serde_json::json!({
            "dcf_html": format!(r#"<div id="dcf-tab"><form id="dcf-form"></form>{marker}</div>"#),
            "dcf_results": {"2026": 120.0, "2025": 110.0}
        })
        .to_string()
    }

    fn bound_page() -> (FakePage, ValuationExchange) {
        let mut page = FakePage::new();
        page.bind_form(0);
        page.bind_form(0);
        assert_eq!(page.forms[0].listeners, 1);
        (page, ValuationExchange::new())
    }

    #[test]
    fn replacement_form_is_rebound_exactly_once() {
        let (mut page, mut exchange) = bound_page();
        assert_eq!(page.submit(&mut exchange, &success_reply("first")), 1);
        assert_eq!(exchange.completed(), 1);
        assert!(page.panel_html.contains("first"));
        assert_eq!(page.live_form, 1);

        assert_eq!(page.submit(&mut exchange, &success_reply("second")), 1);
        assert_eq!(exchange.completed(), 2);
        assert!(page.panel_html.contains("second"));
        assert!(page.forms.iter().all(|f| f.listeners <= 1));
        assert!(!page.loading);
        assert_eq!(exchange.phase(), ExchangePhase::Idle);

        let chart = page.chart.backend();
        assert_eq!(chart.live, 1);
        assert_eq!(chart.created.last().unwrap().labels(), vec!["2025", "2026"]);
    }

    #[test]
    fn server_error_leaves_panel_and_chart_untouched() {
        let (mut page, mut exchange) = bound_page();
        page.submit(&mut exchange, &success_reply("kept"));
        let charts_before = page.chart.backend().created.len();

        assert!(exchange.begin(&mut page));
        let err = exchange
            .complete(&mut page, Ok(r#"{"error": "bad ticker", "dcf_results": {"2025": 1}}"#.into()))
            .unwrap_err();
        assert_eq!(err, ViewError::Server("bad ticker".into()));
        assert!(page.panel_html.contains("kept"));
        assert_eq!(page.chart.backend().created.len(), charts_before);
        assert!(!page.loading);
        assert_eq!(exchange.phase(), ExchangePhase::Idle);
    }

    #[test]
    fn every_failure_path_hides_loading() {
        let failures: Vec<Result<String, ViewError>> = vec![
            Err(ViewError::Transport("connection reset".into())),
            Ok("<html>502 Bad Gateway</html>".into()),
            Ok(r#"{"dcf_html": "<div explode></div>"}"#.into()),
        ];
        for body in failures {
            let (mut page, mut exchange) = bound_page();
            assert!(exchange.begin(&mut page));
            assert!(exchange.complete(&mut page, body).is_err());
            assert!(!page.loading);
            assert_eq!(page.panel_html, "initial");
            assert!(!page.chart.is_live());
        }
    }

    #[test]
    fn missing_anchor_keeps_panel_and_stops() {
        let (mut page, mut exchange) = bound_page();
        assert!(exchange.begin(&mut page));
        let body = serde_json::json!({
            "dcf_html": "<div id=\"other\"></div>",
            "dcf_results": {"2025": 1.0}
        });
        assert!(exchange.complete(&mut page, Ok(body.to_string())).is_ok());
        assert_eq!(page.panel_html, "initial");
        assert!(!page.chart.is_live());
        assert_eq!(page.live_form, 0);
    }

    #[test]
    fn results_without_fragment_only_redraw_chart() {
        let (mut page, mut exchange) = bound_page();
        assert!(exchange.begin(&mut page));
        exchange
            .complete(&mut page, Ok(r#"{"dcf_results": {"2025": 99.5}}"#.into()))
            .unwrap();
        assert_eq!(page.panel_html, "initial");
        assert!(page.chart.is_live());
    }

    #[test]
    fn second_submit_while_in_flight_is_ignored() {
        let (mut page, mut exchange) = bound_page();
        assert!(exchange.begin(&mut page));
        assert!(!exchange.begin(&mut page));
        exchange.complete(&mut page, Ok("{}".into())).unwrap();
        assert!(exchange.begin(&mut page));
    }

    #[test]
    fn decodes_reply_fields_with_truthiness() {
        let update = decode_valuation_reply(r#"{"error": "", "dcf_html": "", "dcf_results": {}}"#).unwrap();
        assert_eq!(update.fragment, None);
        assert_eq!(update.results, Some(ValuationResult::default()));

        let update = decode_valuation_reply(r#"{"error": null, "dcf_results": null}"#).unwrap();
        assert_eq!(update, ValuationUpdate::default());

        assert_eq!(
            decode_valuation_reply(r#"{"error": {"code": 3}}"#),
            Err(ViewError::Server(r#"{"code":3}"#.into()))
        );
        assert!(matches!(
            decode_valuation_reply("\"done\""),
            Err(ViewError::MalformedResponse(_))
        ));
    }
}
