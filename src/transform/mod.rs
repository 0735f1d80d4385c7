use crate::config::types::MetricConfig;
use crate::invoker::InvocationContext;
use crate::record::{Metric, MetricType, SourceResult};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("record {index} is not a {expected}")]
    UnexpectedRecord { index: usize, expected: &'static str },

    #[error("transform failed: {0}")]
    Failed(String),
}

/// Edits sourced records in place before they reach the sinks.
pub trait Transformer: Send + Sync {
    fn transform(
        &self,
        ctx: &InvocationContext,
        result: &mut SourceResult,
    ) -> Result<(), TransformError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Noop;

impl Transformer for Noop {
    fn transform(
        &self,
        _ctx: &InvocationContext,
        _result: &mut SourceResult,
    ) -> Result<(), TransformError> {
        Ok(())
    }
}

/// Stamps the configured name, type and tags onto every metric.
#[derive(Debug, Clone)]
pub struct MetricEnricher {
    name: String,
    metric_type: MetricType,
    tags: BTreeMap<String, String>,
}

impl MetricEnricher {
    pub fn new(
        name: impl Into<String>,
        metric_type: MetricType,
        tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            metric_type,
            tags,
        }
    }
}

impl From<&MetricConfig> for MetricEnricher {
    fn from(config: &MetricConfig) -> Self {
        Self::new(config.name.clone(), config.metric_type, config.tags.clone())
    }
}

impl Transformer for MetricEnricher {
    fn transform(
        &self,
        _ctx: &InvocationContext,
        result: &mut SourceResult,
    ) -> Result<(), TransformError> {
        for (index, record) in result.records_mut().iter_mut().enumerate() {
            let metric = record
                .as_any_mut()
                .downcast_mut::<Metric>()
                .ok_or(TransformError::UnexpectedRecord {
                    index,
                    expected: "metric",
                })?;

            metric.name = self.name.clone();
            metric.metric_type = self.metric_type;
            // Configured tags win over source labels of the same key.
            for (k, v) in &self.tags {
                metric.tags.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }
}
