//! Decoding of the JSON payloads the server embeds in the result page.
//!
//! Decoding is lenient on purpose: a payload that fails to parse disables its
//! feature, and individual values that are not numbers are kept as `None` so
//! they can be filtered where they are used.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ViewConfig;

/// Parse the text of an embedded payload. Blank or missing text yields `None`
/// silently; malformed JSON yields `None` with a warning.
pub fn parse_payload(id: &str, text: Option<&str>) -> Option<Value> {
    let text = text.map(str::trim).filter(|t| !t.is_empty())?;
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("failed to parse JSON from #{id}: {err}");
            None
        }
    }
}

/// Numeric view of a JSON value: numbers and numeric strings.
pub fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

fn integer_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|v| v.is_finite() && v.fract() == 0.0)
                .map(|v| v as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn label_from(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn numeric_entries(map: &Map<String, Value>) -> Vec<(String, Option<f64>)> {
    map.iter()
        .map(|(label, value)| (label.clone(), number_from(value)))
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricRecord {
    pub year: String,
    fields: Map<String, Value>,
}

impl MetricRecord {
    pub fn value(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(number_from)
    }
}

/// Historical metrics, one record per fiscal period, in server order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricSeries {
    records: Vec<MetricRecord>,
}

impl MetricSeries {
    /// `None` unless the payload is a non-empty array.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Array(items) = value else {
            return None;
        };
        let records: Vec<MetricRecord> = items
            .into_iter()
            .map(|item| match item {
                Value::Object(fields) => MetricRecord {
                    year: fields.get("year").map(label_from).unwrap_or_default(),
                    fields,
                },
                _ => MetricRecord {
                    year: String::new(),
                    fields: Map::new(),
                },
            })
            .collect();
        if records.is_empty() {
            None
        } else {
            Some(Self { records })
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn years(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.year.as_str())
    }

    /// `(year, value)` pairs for one metric field, in record order.
    pub fn column<'a>(&'a self, field: &'a str) -> impl Iterator<Item = (&'a str, Option<f64>)> + 'a {
        self.records.iter().map(move |r| (r.year.as_str(), r.value(field)))
    }
}

/// Period label → value for one trend key, in payload order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrendSeries {
    entries: Vec<(String, Option<f64>)>,
}

impl TrendSeries {
    pub fn new(entries: Vec<(String, Option<f64>)>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.entries.iter().map(|(label, value)| (label.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrendMap {
    series: BTreeMap<String, TrendSeries>,
}

impl TrendMap {
    /// Entries whose value is not an object are dropped.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        let series = map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Object(periods) => Some((key, TrendSeries::new(numeric_entries(&periods)))),
                _ => {
                    debug!("trend {key:?} is not an object; skipped");
                    None
                }
            })
            .collect();
        Self { series }
    }

    pub fn get(&self, key: &str) -> Option<&TrendSeries> {
        self.series.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Projected share price per year label, as delivered (unsorted).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValuationResult {
    entries: Vec<(String, Option<f64>)>,
}

impl ValuationResult {
    pub fn new(entries: Vec<(String, Option<f64>)>) -> Self {
        Self { entries }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::new(numeric_entries(map))),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.entries.iter().map(|(label, value)| (label.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpeakerTurn {
    pub speaker: Option<String>,
    pub text: Option<String>,
}

/// One earnings call. Records keep their position in the payload even when
/// malformed, because the select control addresses them by index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TranscriptRecord {
    pub year: Option<i64>,
    pub quarter: Option<i64>,
    pub turns: Vec<SpeakerTurn>,
}

impl TranscriptRecord {
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        let turns = match map.get("transcript") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| SpeakerTurn {
                    speaker: item.get("speaker").and_then(Value::as_str).map(str::to_string),
                    text: item.get("text").and_then(Value::as_str).map(str::to_string),
                })
                .collect(),
            _ => Vec::new(),
        };
        Self {
            year: map.get("year").and_then(integer_from),
            quarter: map.get("quarter").and_then(integer_from),
            turns,
        }
    }

    /// `Q<quarter> <year>`, with `?` standing in for missing parts.
    pub fn period_label(&self) -> String {
        let part = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string());
        format!("Q{} {}", part(self.quarter), part(self.year))
    }

    /// Speaker turns that carry both a speaker and some text.
    pub fn turns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.turns.iter().filter_map(|turn| {
            let speaker = turn.speaker.as_deref().filter(|s| !s.is_empty())?;
            let text = turn.text.as_deref().filter(|t| !t.is_empty())?;
            Some((speaker, text))
        })
    }
}

/// `None` unless the payload is a non-empty array.
pub fn transcripts_from_value(value: &Value) -> Option<Vec<TranscriptRecord>> {
    match value {
        Value::Array(items) if !items.is_empty() => {
            Some(items.iter().map(TranscriptRecord::from_value).collect())
        }
        _ => None,
    }
}

/// All page payloads, resolved once at startup.
#[derive(Clone, Debug, Default)]
pub struct PagePayloads {
    pub metrics: Option<MetricSeries>,
    pub trends: TrendMap,
    pub valuation: Option<ValuationResult>,
    pub transcripts: Option<Vec<TranscriptRecord>>,
}

impl PagePayloads {
    /// `lookup` returns the raw text of the payload element with the given id.
    pub fn collect<F>(config: &ViewConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |id: &str| parse_payload(id, lookup(id).as_deref());
        Self {
            metrics: read(&config.historical_metrics_payload).and_then(MetricSeries::from_value),
            trends: read(&config.trend_payload)
                .map(TrendMap::from_value)
                .unwrap_or_default(),
            valuation: read(&config.valuation_payload)
                .as_ref()
                .and_then(ValuationResult::from_value),
            transcripts: read(&config.transcripts_payload)
                .as_ref()
                .and_then(transcripts_from_value),
        }
    }
}
