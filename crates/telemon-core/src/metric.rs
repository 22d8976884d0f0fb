//! Metric data model and server reply envelope.
//!
//! `Metric` is the typed value flowing through every layer. Its JSON shape is
//! `{"id", "type", "delta"?, "value"?, "hash"?}`. Decoding goes through
//! [`WireMetric`] so an unknown `type` is reported as `BadType` instead of a
//! generic JSON error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// Metric namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Running sum of applied deltas.
    Counter,
    /// Last written value.
    Gauge,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }

    /// Parse the wire name of a kind.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(MetricsError::BadType(other.to_string())),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A counter or gauge sample, or a query when neither field is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMetric")]
pub struct Metric {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Metric {
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
            hash: None,
        }
    }

    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
            hash: None,
        }
    }

    /// Value-less lookup key.
    pub fn query(id: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            id: id.into(),
            kind,
            delta: None,
            value: None,
            hash: None,
        }
    }

    pub fn is_query(&self) -> bool {
        self.delta.is_none() && self.value.is_none()
    }

    /// Check that exactly the field matching `kind` is set.
    pub fn require_value(&self) -> Result<()> {
        match self.kind {
            MetricKind::Counter => {
                if self.value.is_some() {
                    return Err(MetricsError::BadAttrValue(format!(
                        "counter {} carries a gauge value",
                        self.id
                    )));
                }
                if self.delta.is_none() {
                    return Err(MetricsError::NullAttr(format!("delta of counter {}", self.id)));
                }
            }
            MetricKind::Gauge => {
                if self.delta.is_some() {
                    return Err(MetricsError::BadAttrValue(format!(
                        "gauge {} carries a counter delta",
                        self.id
                    )));
                }
                if self.value.is_none() {
                    return Err(MetricsError::NullAttr(format!("value of gauge {}", self.id)));
                }
            }
        }
        Ok(())
    }

    /// Plain-text rendering: the bare value, then `;hash` when signed.
    pub fn as_text(&self) -> String {
        let mut out = match (self.kind, self.delta, self.value) {
            (MetricKind::Counter, Some(d), _) => d.to_string(),
            (MetricKind::Gauge, _, Some(v)) => format!("{v:.3}"),
            _ => String::new(),
        };
        if let Some(h) = self.hash.as_deref().filter(|h| !h.is_empty()) {
            out.push(';');
            out.push_str(h);
        }
        out
    }
}

/// Untyped JSON form of a metric, used only for decoding.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMetric {
    pub id: String,
    #[serde(rename = "type")]
    pub mtype: String,
    #[serde(default)]
    pub delta: Option<i64>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub hash: Option<String>,
}

impl TryFrom<WireMetric> for Metric {
    type Error = MetricsError;

    fn try_from(w: WireMetric) -> Result<Self> {
        let kind = MetricKind::parse(&w.mtype)?;
        Ok(Metric {
            id: w.id,
            kind,
            delta: w.delta,
            value: w.value,
            hash: w.hash.filter(|h| !h.is_empty()),
        })
    }
}

/// Result envelope returned by the dispatcher and the RPC service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

impl ServerResponse {
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            ..Default::default()
        }
    }

    pub fn error(err: impl Into<String>) -> Self {
        Self {
            error: err.into(),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// `message:..;error:..;hash:..;` with empty parts omitted.
    pub fn as_text(&self) -> String {
        let mut out = String::new();
        if !self.message.is_empty() {
            out.push_str(&format!("message:{};", self.message));
        }
        if !self.error.is_empty() {
            out.push_str(&format!("error:{};", self.error));
        }
        if !self.hash.is_empty() {
            out.push_str(&format!("hash:{};", self.hash));
        }
        out
    }
}

impl From<&MetricsError> for ServerResponse {
    fn from(e: &MetricsError) -> Self {
        ServerResponse::error(e.to_string())
    }
}
