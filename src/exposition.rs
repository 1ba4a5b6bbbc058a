//! Rendering gathered metric families as text or JSON.
//!
//! The text form is the standard exposition format. The JSON form mirrors
//! the field names and nesting of the Go exposition library's native JSON
//! encoding of a metric family; existing consumers decode that shape, so it
//! is a wire contract:
//!
//! ```json
//! [{"name":"openebs_reads","help":"...","type":1,
//!   "metric":[{"label":[{"name":"vol","value":"x"}],"gauge":{"value":0}}]}]
//! ```
//!
//! `type` is the metric-type enum number (counter 0, gauge 1, summary 2,
//! untyped 3, histogram 4); empty label lists and absent value kinds are
//! omitted.

use prometheus::proto::{Metric, MetricFamily};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;

use crate::error::{ExporterError, Result};

/// Content type of the text exposition body.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Renders families in the text exposition format.
pub fn render_text(families: &[MetricFamily]) -> Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(families, &mut buf)
        .map_err(|err| ExporterError::Server(err.to_string()))?;
    String::from_utf8(buf).map_err(|err| ExporterError::Server(err.to_string()))
}

/// Renders families as a JSON array of metric-family objects.
pub fn render_json(families: &[MetricFamily]) -> Result<Vec<u8>> {
    let families: Vec<JsonMetricFamily> = families.iter().map(JsonMetricFamily::from).collect();
    Ok(serde_json::to_vec(&families)?)
}

#[derive(Serialize)]
struct JsonMetricFamily {
    name: String,
    help: String,
    #[serde(rename = "type")]
    metric_type: i32,
    metric: Vec<JsonMetric>,
}

#[derive(Serialize)]
struct JsonMetric {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    label: Vec<JsonLabelPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gauge: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counter: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    untyped: Option<JsonValue>,
}

#[derive(Serialize)]
struct JsonLabelPair {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct JsonValue {
    value: f64,
}

impl From<&MetricFamily> for JsonMetricFamily {
    fn from(family: &MetricFamily) -> Self {
        Self {
            name: family.get_name().to_string(),
            help: family.get_help().to_string(),
            metric_type: family.get_field_type() as i32,
            metric: family.get_metric().iter().map(JsonMetric::from).collect(),
        }
    }
}

impl From<&Metric> for JsonMetric {
    fn from(metric: &Metric) -> Self {
        Self {
            label: metric
                .get_label()
                .iter()
                .map(|pair| JsonLabelPair {
                    name: pair.get_name().to_string(),
                    value: pair.get_value().to_string(),
                })
                .collect(),
            gauge: metric
                .gauge
                .as_ref()
                .map(|gauge| JsonValue {
                    value: gauge.value(),
                }),
            counter: metric
                .counter
                .as_ref()
                .map(|counter| JsonValue {
                    value: counter.value(),
                }),
            untyped: metric
                .untyped
                .as_ref()
                .map(|untyped| JsonValue {
                    value: untyped.value(),
                }),
        }
    }
}

/// Decodes a rendered body (either format) into a `(name{labels}, value)`
/// map, used to check that the two renderings agree.
#[cfg(test)]
pub(crate) fn sample_map(families: &[MetricFamily]) -> std::collections::BTreeMap<String, f64> {
    let mut samples = std::collections::BTreeMap::new();
    for family in families {
        for metric in family.get_metric() {
            let mut key = family.get_name().to_string();
            for pair in metric.get_label() {
                key.push_str(&format!(",{}={}", pair.get_name(), pair.get_value()));
            }
            let value = metric
                .gauge
                .as_ref()
                .map(|gauge| gauge.value())
                .or_else(|| metric.counter.as_ref().map(|counter| counter.value()))
                .or_else(|| metric.untyped.as_ref().map(|untyped| untyped.value()))
                .unwrap_or_default();
            samples.insert(key, value);
        }
    }
    samples
}
