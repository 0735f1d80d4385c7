//! Side observations of the engine: invocation counts, step durations and
//! watermark positions. Nothing here feeds back into control flow.

use chrono::{DateTime, Utc};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metrics output was not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Status::Ok
        } else {
            Status::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
        }
    }
}

pub trait MetricsRecorder: Send + Sync {
    fn invoke(&self, collector: &str, status: Status, elapsed: Duration);
    fn source(&self, source_type: &str, status: Status, elapsed: Duration, records: usize);
    fn sink(&self, sink_type: &str, status: Status, elapsed: Duration);
    fn watermark(&self, collector: &str, end: DateTime<Utc>);

    /// Text exposition of everything recorded so far, if the recorder keeps any.
    fn render(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn invoke(&self, _: &str, _: Status, _: Duration) {}
    fn source(&self, _: &str, _: Status, _: Duration, _: usize) {}
    fn sink(&self, _: &str, _: Status, _: Duration) {}
    fn watermark(&self, _: &str, _: DateTime<Utc>) {}
}

/// Recorder backed by its own Prometheus registry.
pub struct PrometheusRecorder {
    registry: Registry,
    invoke_total: IntCounterVec,
    invoke_duration: HistogramVec,
    source_duration: HistogramVec,
    source_records: IntGaugeVec,
    sink_duration: HistogramVec,
    watermark: IntGaugeVec,
}

impl PrometheusRecorder {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let invoke_total = IntCounterVec::new(
            Opts::new("collector_invoke_total", "Collector invocations"),
            &["collector", "status"],
        )?;
        let invoke_duration = HistogramVec::new(
            HistogramOpts::new(
                "collector_invoke_duration_seconds",
                "Wall time of a full collector invocation",
            ),
            &["collector", "status"],
        )?;
        let source_duration = HistogramVec::new(
            HistogramOpts::new("collector_source_duration_seconds", "Wall time of source calls"),
            &["source_type", "status"],
        )?;
        let source_records = IntGaugeVec::new(
            Opts::new("collector_source_records", "Records returned by the last source call"),
            &["source_type"],
        )?;
        let sink_duration = HistogramVec::new(
            HistogramOpts::new("collector_sink_duration_seconds", "Wall time of sink writes"),
            &["sink_type", "status"],
        )?;
        let watermark = IntGaugeVec::new(
            Opts::new(
                "collector_watermark_seconds",
                "Unix time of the stored window end per collector",
            ),
            &["collector"],
        )?;

        registry.register(Box::new(invoke_total.clone()))?;
        registry.register(Box::new(invoke_duration.clone()))?;
        registry.register(Box::new(source_duration.clone()))?;
        registry.register(Box::new(source_records.clone()))?;
        registry.register(Box::new(sink_duration.clone()))?;
        registry.register(Box::new(watermark.clone()))?;

        Ok(Self {
            registry,
            invoke_total,
            invoke_duration,
            source_duration,
            source_records,
            sink_duration,
            watermark,
        })
    }

    pub fn encode(&self) -> Result<String, TelemetryError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

impl MetricsRecorder for PrometheusRecorder {
    fn invoke(&self, collector: &str, status: Status, elapsed: Duration) {
        let labels = [collector, status.as_str()];
        self.invoke_total.with_label_values(&labels).inc();
        self.invoke_duration
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
    }

    fn source(&self, source_type: &str, status: Status, elapsed: Duration, records: usize) {
        self.source_duration
            .with_label_values(&[source_type, status.as_str()])
            .observe(elapsed.as_secs_f64());
        self.source_records
            .with_label_values(&[source_type])
            .set(records as i64);
    }

    fn sink(&self, sink_type: &str, status: Status, elapsed: Duration) {
        self.sink_duration
            .with_label_values(&[sink_type, status.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    fn watermark(&self, collector: &str, end: DateTime<Utc>) {
        self.watermark
            .with_label_values(&[collector])
            .set(end.timestamp());
    }

    fn render(&self) -> Option<String> {
        match self.encode() {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode metrics");
                None
            }
        }
    }
}
