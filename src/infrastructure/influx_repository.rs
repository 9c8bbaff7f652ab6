// InfluxDB repository implementation
use crate::application::series_repository::SeriesRepository;
use crate::domain::series::{Frame, SeekerQuery, ValueField};
use crate::domain::time_range::TimeRange;
use crate::infrastructure::config::{InfluxSettings, QueryTemplates, prepare_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct InfluxRepository {
    client: reqwest::Client,
    host: String,
    token: String,
    database: String,
    retention_policy: String,
    templates: QueryTemplates,
    max_points_per_batch: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    name: String,
    columns: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    tags: Option<HashMap<String, String>>,
}

impl InfluxRepository {
    pub fn new(
        settings: InfluxSettings,
        templates: QueryTemplates,
        max_points_per_batch: Option<usize>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: settings.host.trim_end_matches('/').to_string(),
            token: settings.token,
            database: settings.database,
            retention_policy: settings.retention_policy,
            templates,
            max_points_per_batch,
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&epoch=ms&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    fn render_query(&self, query: &SeekerQuery, window: TimeRange) -> String {
        let mut vars = HashMap::new();
        vars.insert("from".to_string(), window.from.to_string());
        vars.insert("to".to_string(), window.to.to_string());
        let selection = query.selection.trim();
        vars.insert(
            "selection".to_string(),
            if selection.is_empty() {
                String::new()
            } else {
                format!(" AND ({})", selection)
            },
        );
        prepare_query(self.templates.template(query.metric), &vars)
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        if let Some(result) = data.results.first() {
            if let Some(error) = &result.error {
                anyhow::bail!("InfluxDB query error: {}", error);
            }
        }

        Ok(data)
    }
}

#[async_trait]
impl SeriesRepository for InfluxRepository {
    async fn fetch_series(&self, query: &SeekerQuery, window: TimeRange) -> Result<Vec<Frame>> {
        let influxql = self.render_query(query, window);
        tracing::debug!("Executing series query: {}", influxql);

        let response = self.execute_query(&influxql).await?;
        let frames = frames_from_response(response);

        Ok(match self.max_points_per_batch {
            Some(max_points) => frames
                .into_iter()
                .map(|frame| downsample_frame(frame, max_points))
                .collect(),
            None => frames,
        })
    }
}

/// One frame per returned series: `time` becomes the time column, every other
/// column a value field labelled with the series tags.
fn frames_from_response(response: InfluxQLResponse) -> Vec<Frame> {
    let mut frames = Vec::new();
    for result in response.results {
        for series in result.series.unwrap_or_default() {
            let time_idx = series.columns.iter().position(|c| c == "time").unwrap_or(0);
            let labels: BTreeMap<String, String> =
                series.tags.unwrap_or_default().into_iter().collect();

            let mut times = Vec::with_capacity(series.values.len());
            let mut columns: Vec<Vec<f64>> = vec![Vec::new(); series.columns.len()];
            for row in &series.values {
                let Some(time) = row.get(time_idx).and_then(parse_time) else {
                    continue;
                };
                times.push(time);
                for (idx, column) in columns.iter_mut().enumerate() {
                    if idx != time_idx {
                        column.push(row.get(idx).and_then(|v| v.as_f64()).unwrap_or(f64::NAN));
                    }
                }
            }

            let fields = series
                .columns
                .iter()
                .zip(columns)
                .enumerate()
                .filter(|(idx, _)| *idx != time_idx)
                .map(|(_, (name, values))| ValueField::new(name.clone(), values).with_labels(labels.clone()))
                .collect();

            frames.push(Frame {
                name: Some(series.name),
                times,
                fields,
            });
        }
    }
    frames
}

fn parse_time(value: &serde_json::Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.timestamp_millis())
    })
}

/// Downsample a frame using bucket averaging
fn downsample_frame(frame: Frame, max_points: usize) -> Frame {
    if max_points == 0 || frame.len() <= max_points {
        return frame;
    }

    let bucket_size = (frame.len() as f64 / max_points as f64).ceil() as usize;
    let mut times = Vec::with_capacity(max_points);
    let mut fields: Vec<ValueField> = frame
        .fields
        .iter()
        .map(|f| ValueField {
            name: f.name.clone(),
            labels: f.labels.clone(),
            values: Vec::with_capacity(max_points),
        })
        .collect();

    for chunk_start in (0..frame.len()).step_by(bucket_size) {
        let chunk_end = std::cmp::min(chunk_start + bucket_size, frame.len());

        // Use middle point's timestamp and average value
        let mid_idx = chunk_start + (chunk_end - chunk_start) / 2;
        times.push(frame.times[mid_idx]);
        for (out, field) in fields.iter_mut().zip(&frame.fields) {
            let chunk = &field.values[chunk_start..chunk_end.min(field.values.len())];
            let avg = chunk.iter().sum::<f64>() / chunk.len().max(1) as f64;
            out.values.push(avg);
        }
    }

    Frame {
        name: frame.name,
        times,
        fields,
    }
}
