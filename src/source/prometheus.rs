use super::{until_cancelled, SourceError, Sourcer};
use crate::config::types::PrometheusSourceConfig;
use crate::invoker::InvocationContext;
use crate::record::{Metric, SourceResult};
use crate::timeseries::last_complete_window;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Instant query against the Prometheus HTTP API.
pub struct PrometheusSource {
    client: reqwest::Client,
    endpoint: String,
    query: String,
    window: Option<Duration>,
    start_of: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Value,
}

#[derive(Debug, Deserialize)]
struct Sample {
    #[serde(default)]
    metric: Map<String, Value>,
    value: (f64, String),
}

impl PrometheusSource {
    pub fn new(config: &PrometheusSourceConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/v1/query", config.uri.trim_end_matches('/')),
            query: config.query.clone(),
            window: config.window,
            start_of: config.start_of,
        })
    }

    /// Windowed invocations evaluate at the window end; tick invocations at
    /// the start time, optionally truncated by `start_of`.
    fn evaluation_time(&self, ctx: &InvocationContext) -> Result<DateTime<Utc>, SourceError> {
        if let Some(window) = ctx.window() {
            return Ok(window.end());
        }
        match self.start_of {
            Some(d) => Ok(last_complete_window(ctx.started_at(), d)?.end()),
            None => Ok(ctx.started_at()),
        }
    }

    async fn query(&self, at: DateTime<Utc>) -> Result<ApiData, SourceError> {
        let time = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("query", self.query.as_str()), ("time", time.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        let parsed: ApiResponse = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(SourceError::Status {
                    status: status.as_u16(),
                    uri: self.endpoint.clone(),
                })
            }
            Err(e) => return Err(SourceError::Decode(e.to_string())),
        };

        if parsed.status != "success" {
            return Err(SourceError::Api(format!(
                "{}: {}",
                parsed.error_type.unwrap_or_else(|| parsed.status.clone()),
                parsed.error.unwrap_or_default()
            )));
        }
        parsed
            .data
            .ok_or_else(|| SourceError::Decode("response has no data".to_string()))
    }

    fn into_result(
        &self,
        ctx: &InvocationContext,
        data: ApiData,
    ) -> Result<SourceResult, SourceError> {
        let samples: Vec<Sample> = match data.result_type.as_str() {
            "vector" => serde_json::from_value(data.result)
                .map_err(|e| SourceError::Decode(e.to_string()))?,
            "scalar" => {
                let value: (f64, String) = serde_json::from_value(data.result)
                    .map_err(|e| SourceError::Decode(e.to_string()))?;
                vec![Sample {
                    metric: Map::new(),
                    value,
                }]
            }
            other => {
                return Err(SourceError::Api(format!(
                    "unsupported result type {:?}",
                    other
                )))
            }
        };

        let mut result = SourceResult::empty();
        for sample in samples {
            let (at, value) = sample.value;
            let mut row = sample.metric;
            row.remove("__name__");
            row.insert("value".to_string(), Value::String(value));

            let timestamp = DateTime::from_timestamp_millis((at * 1000.0) as i64)
                .unwrap_or_else(|| ctx.started_at());
            let mut metric = Metric::from_row(row, timestamp)?;
            metric.window = ctx.window().map(|w| w.start());
            result.push(metric);
        }
        Ok(result)
    }
}

#[async_trait]
impl Sourcer for PrometheusSource {
    async fn source(&self, ctx: &InvocationContext) -> Result<SourceResult, SourceError> {
        let at = self.evaluation_time(ctx)?;
        let data = until_cancelled(ctx, self.query(at)).await?;
        self.into_result(ctx, data)
    }

    fn window(&self) -> Option<Duration> {
        self.window
    }

    fn source_type(&self) -> &str {
        "prometheus"
    }
}
