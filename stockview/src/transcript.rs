//! Transcript selection and summary requests.

use serde_json::Value as JsonValue;
use tracing::{debug, error};

use crate::exchange::{error_message, truthy};
use crate::markup::{escape_html, text_with_breaks};
use crate::payload::TranscriptRecord;
use crate::ViewError;

/// Stamp of one summary request. Only the response to the newest request
/// issued since the last selection change may be shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SummaryTicket(u64);

#[derive(Clone, Debug, PartialEq)]
pub struct SummaryRequest {
    pub ticker: String,
    pub year: i64,
    pub quarter: i64,
    pub ticket: SummaryTicket,
}

impl SummaryRequest {
    /// Form fields posted to the summary endpoint.
    pub fn form_fields(&self) -> [(&'static str, String); 3] {
        [
            ("ticker", self.ticker.clone()),
            ("year", self.year.to_string()),
            ("quarter", self.quarter.to_string()),
        ]
    }
}

/// What the summary panel shows.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SummaryView {
    #[default]
    Empty,
    NoTranscript,
    Pending,
    Summary(String),
    Error(String),
    Missing,
    Failed,
}

impl SummaryView {
    pub fn to_html(&self) -> String {
        match self {
            SummaryView::Empty => String::new(),
            SummaryView::NoTranscript => "<p>No transcript selected.</p>".to_string(),
            SummaryView::Pending => "<p>Generating summary...</p>".to_string(),
            SummaryView::Summary(text) => {
                format!("<p><strong>Summary:</strong><br>{}</p>", text_with_breaks(text))
            }
            SummaryView::Error(message) => {
                format!("<p style=\"color:red;\">Error: {}</p>", escape_html(message))
            }
            SummaryView::Missing => "<p>No summary returned.</p>".to_string(),
            SummaryView::Failed => {
                "<p style=\"color:red;\">Failed to generate summary.</p>".to_string()
            }
        }
    }
}

/// Turn a summary reply (or transport failure) into what the panel shows.
pub fn decode_summary_reply(body: Result<String, ViewError>) -> SummaryView {
    let reply = body.and_then(|text| {
        serde_json::from_str::<JsonValue>(&text).map_err(|e| ViewError::MalformedResponse(e.to_string()))
    });
    let reply = match reply {
        Ok(reply) => reply,
        Err(err) => {
            error!("error generating summary: {err}");
            return SummaryView::Failed;
        }
    };
    if let Some(err) = reply.get("error").filter(|e| truthy(e)) {
        let message = error_message(err);
        error!("summary request failed: {message}");
        return SummaryView::Error(message);
    }
    match reply.get("summary") {
        Some(JsonValue::String(summary)) => SummaryView::Summary(summary.clone()),
        _ => SummaryView::Missing,
    }
}

/// Read a select control's value as a list index, the way `Number()` does:
/// blank is 0, anything that is not a non-negative integer is rejected.
pub fn parse_index(raw: &str) -> Option<usize> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    let value: f64 = trimmed.parse().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= usize::MAX as f64 {
        Some(value as usize)
    } else {
        None
    }
}

/// The transcripts of the page and which one is shown.
#[derive(Clone, Debug)]
pub struct TranscriptSelector {
    records: Vec<TranscriptRecord>,
    selected: usize,
    generation: u64,
}

impl TranscriptSelector {
    /// `control_value` is the select control's value at startup; an
    /// unusable value falls back to the first record.
    pub fn new(records: Vec<TranscriptRecord>, control_value: Option<&str>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let selected = control_value
            .and_then(parse_index)
            .filter(|&i| i < records.len())
            .unwrap_or(0);
        Some(Self {
            records,
            selected,
            generation: 0,
        })
    }

    pub fn records(&self) -> &[TranscriptRecord] {
        &self.records
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> &TranscriptRecord {
        &self.records[self.selected]
    }

    /// Follow a change of the select control. Returns the new index, or `None`
    /// (selection unchanged) when the value does not address a record. Any
    /// summary request still in flight is invalidated.
    pub fn select(&mut self, control_value: &str) -> Option<usize> {
        let index = parse_index(control_value).filter(|&i| i < self.records.len())?;
        self.selected = index;
        self.generation += 1;
        Some(index)
    }

    /// Build the request for the record the select control currently points
    /// at. Each call issues a new ticket; no request is ever suppressed.
    pub fn request_summary(
        &mut self,
        ticker: &str,
        control_value: Option<&str>,
    ) -> Result<SummaryRequest, SummaryView> {
        let index = match control_value {
            Some(raw) => parse_index(raw),
            None => Some(0),
        };
        // Any reply still in flight is superseded, even when nothing is sent.
        self.generation += 1;
        let record = index
            .and_then(|i| self.records.get(i))
            .ok_or(SummaryView::NoTranscript)?;
        let (Some(year), Some(quarter)) = (record.year, record.quarter) else {
            debug!("transcript {index:?} has no year/quarter");
            return Err(SummaryView::NoTranscript);
        };
        Ok(SummaryRequest {
            ticker: ticker.to_string(),
            year,
            quarter,
            ticket: SummaryTicket(self.generation),
        })
    }

    /// Whether the response for `ticket` is still the one to show.
    pub fn accepts(&self, ticket: SummaryTicket) -> bool {
        ticket.0 == self.generation
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::payload::transcripts_from_value;

    fn selector(control: Option<&str>) -> TranscriptSelector {
        let records = transcripts_from_value(&json!([
            {"year": 2024, "quarter": 3, "transcript": []},
            {"year": 2024, "quarter": 2, "transcript": []},
            {"year": 2024, "quarter": 1, "transcript": []},
            {"transcript": []},
        ]))
        .unwrap();
        TranscriptSelector::new(records, control).unwrap()
    }

    #[test]
    fn initial_selection_follows_control() {
        assert_eq!(selector(Some("1")).selected_index(), 1);
        assert_eq!(selector(Some("9")).selected_index(), 0);
        assert_eq!(selector(Some("abc")).selected_index(), 0);
        assert_eq!(selector(None).selected_index(), 0);
        assert!(TranscriptSelector::new(Vec::new(), None).is_none());
    }

    #[test]
    fn summary_request_uses_current_control_value() {
        let mut selector = selector(Some("0"));
        assert_eq!(selector.select("2"), Some(2));
        let request = selector.request_summary("AAPL", Some("2")).unwrap();
        assert_eq!((request.year, request.quarter), (2024, 1));
        assert_eq!(
            request.form_fields(),
            [
                ("ticker", "AAPL".to_string()),
                ("year", "2024".to_string()),
                ("quarter", "1".to_string()),
            ]
        );
        assert_eq!(selector.selected().quarter, Some(1));
    }

    #[test]
    fn unusable_selection_yields_no_transcript() {
        let mut selector = selector(None);
        assert_eq!(selector.select("7"), None);
        assert_eq!(selector.selected_index(), 0);
        assert_eq!(selector.request_summary("T", Some("7")), Err(SummaryView::NoTranscript));
        assert_eq!(selector.request_summary("T", Some("x")), Err(SummaryView::NoTranscript));
        assert_eq!(selector.request_summary("T", Some("3")), Err(SummaryView::NoTranscript));
        assert!(selector.request_summary("T", None).is_ok());
    }

    #[test]
    fn late_responses_are_discarded() {
        let mut selector = selector(None);
        let first = selector.request_summary("T", Some("0")).unwrap();
        let second = selector.request_summary("T", Some("0")).unwrap();
        assert_ne!(first.ticket, second.ticket);
        assert!(!selector.accepts(first.ticket));
        assert!(selector.accepts(second.ticket));

        selector.select("1");
        assert!(!selector.accepts(second.ticket));
    }

    #[test]
    fn no_transcript_supersedes_pending_reply() {
        let mut selector = selector(None);
        let pending = selector.request_summary("T", Some("0")).unwrap();
        assert_eq!(selector.request_summary("T", Some("3")), Err(SummaryView::NoTranscript));
        assert!(!selector.accepts(pending.ticket));

        let pending = selector.request_summary("T", Some("1")).unwrap();
        assert_eq!(selector.request_summary("T", Some("x")), Err(SummaryView::NoTranscript));
        assert!(!selector.accepts(pending.ticket));
    }

    #[test]
    fn decodes_summary_replies() {
        assert_eq!(
            decode_summary_reply(Ok(r#"{"summary": "Up\nDown"}"#.into())),
            SummaryView::Summary("Up\nDown".into())
        );
        assert_eq!(
            decode_summary_reply(Ok(r#"{"error": "Summary file not found."}"#.into())),
            SummaryView::Error("Summary file not found.".into())
        );
        assert_eq!(decode_summary_reply(Ok(r#"{"summary": 4}"#.into())), SummaryView::Missing);
        assert_eq!(decode_summary_reply(Ok("{}".into())), SummaryView::Missing);
        assert_eq!(decode_summary_reply(Ok("oops".into())), SummaryView::Failed);
        assert_eq!(
            decode_summary_reply(Err(ViewError::Transport("offline".into()))),
            SummaryView::Failed
        );
    }

    #[test]
    fn summary_html_escapes_and_breaks_lines() {
        let html = SummaryView::Summary("Revenue <up>\nMargins flat".into()).to_html();
        assert_eq!(html, "<p><strong>Summary:</strong><br>Revenue &lt;up&gt;<br>Margins flat</p>");
        assert_eq!(
            SummaryView::Error("bad & worse".into()).to_html(),
            "<p style=\"color:red;\">Error: bad &amp; worse</p>"
        );
        assert_eq!(SummaryView::Empty.to_html(), "");
    }
}
