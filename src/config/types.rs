use crate::collector::{BackfillPolicy, InvocationStrategy};
use crate::record::MetricType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub collectors: CollectorsConfig,
    #[serde(default)]
    pub state_store: StateStoreConfig,
    #[serde(default)]
    pub web: Option<WebConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorsConfig {
    /// Directory holding one collector definition per `*.yml` / `*.yaml` file.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateStoreConfig {
    #[serde(rename = "type", default)]
    pub store_type: StateStoreType,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateStoreType {
    #[default]
    Memory,
    Duckdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub listen: String,
}

/// One collector definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CollectorType,
    pub invocation: InvocationConfig,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub metric: Option<MetricConfig>,
    pub source: SourceConfig,
    #[serde(default)]
    pub sinks: BTreeMap<String, SinkConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorType {
    Metric,
    Partition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationConfig {
    pub strategy: InvocationStrategy,
    #[serde(default)]
    pub backfill: BackfillPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    #[serde(default)]
    pub cron: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub metric_type: MetricType,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Prometheus(PrometheusSourceConfig),
    Object(ObjectSourceConfig),
}

impl SourceConfig {
    pub fn window(&self) -> Option<Duration> {
        match self {
            SourceConfig::Prometheus(c) => c.window,
            SourceConfig::Object(c) => c.window,
        }
    }

    pub fn source_type(&self) -> &'static str {
        match self {
            SourceConfig::Prometheus(_) => "prometheus",
            SourceConfig::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusSourceConfig {
    pub uri: String,
    pub query: String,
    #[serde(default, with = "humantime_serde")]
    pub window: Option<Duration>,
    /// Tick mode only: evaluate the query at "now" truncated to this duration.
    #[serde(default, with = "humantime_serde")]
    pub start_of: Option<Duration>,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSourceConfig {
    /// URI template; strftime placeholders are filled from the window start.
    pub uri: String,
    #[serde(default, with = "humantime_serde")]
    pub window: Option<Duration>,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Console,
    File(FileSinkConfig),
    Http(HttpSinkConfig),
}

impl SinkConfig {
    pub fn sink_type(&self) -> &'static str {
        match self {
            SinkConfig::Console => "console",
            SinkConfig::File(_) => "file",
            SinkConfig::Http(_) => "http",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSinkConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSinkConfig {
    pub uri: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}
