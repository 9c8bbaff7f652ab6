use crate::application::seeker_engine::EngineSettings;
use crate::domain::error::SeekerResult;
use crate::domain::series::{MetricKind, SeekerQuery};
use crate::domain::time_range::ContextPreset;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
pub struct SeekerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub influx: InfluxSettings,
    #[serde(default)]
    pub seeker: SeekerSettings,
    pub queries: QueryTemplates,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeekerSettings {
    #[serde(default = "default_context")]
    pub default_context: String,
    #[serde(default = "default_pan_fraction")]
    pub pan_fraction: f64,
    #[serde(default = "default_max_cached_batches")]
    pub max_cached_batches: usize,
    pub max_points_per_batch: Option<usize>,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default)]
    pub selection: String,
}

impl Default for SeekerSettings {
    fn default() -> Self {
        Self {
            default_context: default_context(),
            pan_fraction: default_pan_fraction(),
            max_cached_batches: default_max_cached_batches(),
            max_points_per_batch: None,
            metric: default_metric(),
            selection: String::new(),
        }
    }
}

impl SeekerSettings {
    pub fn engine_settings(&self) -> SeekerResult<EngineSettings> {
        Ok(EngineSettings {
            default_context: ContextPreset::parse(&self.default_context)?,
            pan_fraction: self.pan_fraction,
        })
    }

    pub fn initial_query(&self) -> SeekerResult<SeekerQuery> {
        Ok(SeekerQuery::new(self.metric.parse()?, self.selection.clone()))
    }
}

/// InfluxQL templates per metric. Placeholders: `${from}`, `${to}` (epoch ms)
/// and `${selection}` (empty or ` AND (<selection>)`).
#[derive(Debug, Deserialize, Clone)]
pub struct QueryTemplates {
    pub rate: String,
    pub errors: String,
    pub duration: String,
}

impl QueryTemplates {
    pub fn template(&self, metric: MetricKind) -> &str {
        match metric {
            MetricKind::Rate => &self.rate,
            MetricKind::Errors => &self.errors,
            MetricKind::Duration => &self.duration,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_context() -> String {
    "24h".to_string()
}

fn default_pan_fraction() -> f64 {
    0.25
}

fn default_max_cached_batches() -> usize {
    crate::application::batch_cache::MAX_CACHE_SIZE
}

fn default_metric() -> String {
    MetricKind::Rate.as_str().to_string()
}

/// `config/seeker.{toml,yaml,json}` overridden by `SEEKER__SECTION__KEY` variables.
pub fn load_seeker_config() -> anyhow::Result<SeekerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/seeker"))
        .add_source(config::Environment::with_prefix("SEEKER").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_query() {
        let mut vars = HashMap::new();
        vars.insert("from".to_string(), "1000".to_string());
        vars.insert("to".to_string(), "2000".to_string());
        vars.insert("selection".to_string(), " AND (\"service\"='api')".to_string());

        let query = "SELECT sum(\"count\") FROM spans WHERE time >= ${from}ms AND time < ${to}ms${selection}";
        let result = prepare_query(query, &vars);

        assert_eq!(
            result,
            "SELECT sum(\"count\") FROM spans WHERE time >= 1000ms AND time < 2000ms AND (\"service\"='api')"
        );
    }

    #[test]
    fn test_settings_defaults_and_parsing() {
        let settings = SeekerSettings::default();
        let engine = settings.engine_settings().unwrap();
        assert_eq!(engine.default_context.label(), "24h");
        assert_eq!(engine.pan_fraction, 0.25);
        assert_eq!(settings.initial_query().unwrap().metric, MetricKind::Rate);

        let bad = SeekerSettings {
            default_context: "forever".to_string(),
            ..SeekerSettings::default()
        };
        assert!(bad.engine_settings().is_err());
    }

    #[test]
    fn test_deserialize_from_toml_source() {
        let raw = r#"
            [influx]
            host = "http://localhost:8086"
            token = "t"
            database = "traces"
            retention_policy = "autogen"

            [seeker]
            default_context = "3d"
            metric = "duration"

            [queries]
            rate = "r"
            errors = "e"
            duration = "d"
        "#;
        let config: SeekerConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.seeker.default_context, "3d");
        assert_eq!(config.seeker.max_cached_batches, 10);
        assert_eq!(config.queries.template(MetricKind::Duration), "d");
    }
}
