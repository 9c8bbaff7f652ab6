// Series data domain models
use super::error::SeekerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Rate,
    Errors,
    Duration,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Rate => "rate",
            MetricKind::Errors => "errors",
            MetricKind::Duration => "duration",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = SeekerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rate" => Ok(MetricKind::Rate),
            "errors" => Ok(MetricKind::Errors),
            "duration" => Ok(MetricKind::Duration),
            other => Err(SeekerError::UnknownMetric(other.to_string())),
        }
    }
}

/// What the seeker is plotting: a metric kind plus an opaque selection
/// (datasource, filters) that only the query collaborator interprets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekerQuery {
    pub metric: MetricKind,
    #[serde(default)]
    pub selection: String,
}

impl SeekerQuery {
    pub fn new(metric: MetricKind, selection: impl Into<String>) -> Self {
        Self {
            metric,
            selection: selection.into(),
        }
    }

    /// Key the cache compares to decide whether stored batches are still valid.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.metric, self.selection)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueField {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub values: Vec<f64>,
}

impl ValueField {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            values,
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }
}

/// A time column plus one or more value columns of the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub name: Option<String>,
    pub times: Vec<i64>,
    pub fields: Vec<ValueField>,
}

impl Frame {
    pub fn new(times: Vec<i64>, fields: Vec<ValueField>) -> Self {
        Self {
            name: None,
            times,
            fields,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn first_time(&self) -> Option<i64> {
        self.times.first().copied()
    }

    /// Stable key built from field names and types, time field first.
    pub fn shape_signature(&self) -> String {
        let mut signature = String::from("time:time");
        for field in &self.fields {
            signature.push('|');
            signature.push_str(&field.name);
            if !field.labels.is_empty() {
                let labels: Vec<String> =
                    field.labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
                signature.push('{');
                signature.push_str(&labels.join(","));
                signature.push('}');
            }
            signature.push_str(":number");
        }
        signature
    }

    pub fn row(&self, index: usize) -> Vec<f64> {
        self.fields
            .iter()
            .map(|f| f.values.get(index).copied().unwrap_or(f64::NAN))
            .collect()
    }
}

/// Drop rows that hold a non-finite value in any field, and rows missing a value.
/// The remaining rows are ordered by time; of several rows at one instant the first is kept.
pub fn sanitize_frame(frame: Frame) -> Frame {
    let mut rows: Vec<usize> = (0..frame.times.len())
        .filter(|&i| {
            frame
                .fields
                .iter()
                .all(|f| f.values.get(i).is_some_and(|v| v.is_finite()))
        })
        .collect();
    rows.sort_by_key(|&i| frame.times[i]);
    rows.dedup_by_key(|i| frame.times[*i]);

    let untouched = rows.len() == frame.times.len()
        && rows.iter().enumerate().all(|(pos, &i)| pos == i)
        && frame.fields.iter().all(|f| f.values.len() == frame.times.len());
    if untouched {
        return frame;
    }

    let times = rows.iter().map(|&i| frame.times[i]).collect();
    let fields = frame
        .fields
        .into_iter()
        .map(|field| ValueField {
            values: rows.iter().map(|&i| field.values[i]).collect(),
            ..field
        })
        .collect();
    Frame {
        name: frame.name,
        times,
        fields,
    }
}

/// A chart needs at least two finite points to draw anything meaningful.
pub fn has_enough_points(frames: &[Frame]) -> bool {
    frames.iter().map(Frame::len).sum::<usize>() >= 2
}
