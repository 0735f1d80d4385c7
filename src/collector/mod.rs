pub mod metric;
pub mod partition;

pub use metric::MetricCollector;
pub use partition::PartitionCollector;

use crate::config::types::{CollectorConfig, CollectorType, ScheduleConfig};
use crate::sink::{build_sinkers, SinkError, Sinker};
use crate::source::{build_sourcer, SourceError, Sourcer};
use crate::storage::Storer;
use crate::transform::{MetricEnricher, Transformer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("collector {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// How an invoker decides what to collect on each firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStrategy {
    /// Collect current state with no time range and no watermark.
    Tick,
    /// Collect fixed, non-overlapping windows tracked by a stored watermark.
    HistoricTumblingWindow,
    /// Recognised but not implemented; every invocation fails.
    Incremental,
}

impl InvocationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStrategy::Tick => "tick",
            InvocationStrategy::HistoricTumblingWindow => "historic_tumbling_window",
            InvocationStrategy::Incremental => "incremental",
        }
    }

    pub fn is_windowed(&self) -> bool {
        matches!(self, InvocationStrategy::HistoricTumblingWindow)
    }
}

impl fmt::Display for InvocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a windowed invoker does when more than one window is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillPolicy {
    #[default]
    Reject,
    Sequential,
}

/// When a collector fires. Exactly one of interval or cron.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Interval(Duration),
    Cron(String),
}

impl Schedule {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Schedule::Interval(d) => Some(*d),
            Schedule::Cron(_) => None,
        }
    }

    pub fn cron(&self) -> Option<&str> {
        match self {
            Schedule::Interval(_) => None,
            Schedule::Cron(expr) => Some(expr),
        }
    }
}

impl TryFrom<&ScheduleConfig> for Schedule {
    type Error = String;

    fn try_from(config: &ScheduleConfig) -> Result<Self, Self::Error> {
        match (config.interval, config.cron.as_deref()) {
            (Some(_), Some(_)) => Err("schedule must set only one of interval or cron".to_string()),
            (None, None) => Err("schedule must set one of interval or cron".to_string()),
            (Some(d), None) if d.is_zero() => Err("schedule interval must be non-zero".to_string()),
            (Some(d), None) => Ok(Schedule::Interval(d)),
            (None, Some(expr)) => Ok(Schedule::Cron(expr.to_string())),
        }
    }
}

/// Everything an invoker needs from a collector, whatever its kind.
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;
    fn invocation_strategy(&self) -> InvocationStrategy;
    fn backfill_policy(&self) -> BackfillPolicy {
        BackfillPolicy::Reject
    }
    fn schedule(&self) -> &Schedule;
    fn sourcer(&self) -> &dyn Sourcer;
    fn transformer(&self) -> &dyn Transformer;
    fn sinks_mut(&mut self) -> &mut [Box<dyn Sinker>];
    fn storer(&self) -> &dyn Storer;
}

/// Collaborators shared by every collector kind.
pub struct CollectorCore {
    pub name: String,
    pub strategy: InvocationStrategy,
    pub backfill: BackfillPolicy,
    pub schedule: Schedule,
    pub sourcer: Box<dyn Sourcer>,
    pub sinks: Vec<Box<dyn Sinker>>,
    pub storer: Arc<dyn Storer>,
}

/// Collector kinds known to the daemon.
pub enum CollectorKind {
    Metric(MetricCollector),
    Partition(PartitionCollector),
}

impl CollectorKind {
    fn inner(&self) -> &dyn Collector {
        match self {
            CollectorKind::Metric(c) => c,
            CollectorKind::Partition(c) => c,
        }
    }
}

impl Collector for CollectorKind {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn invocation_strategy(&self) -> InvocationStrategy {
        self.inner().invocation_strategy()
    }

    fn backfill_policy(&self) -> BackfillPolicy {
        self.inner().backfill_policy()
    }

    fn schedule(&self) -> &Schedule {
        self.inner().schedule()
    }

    fn sourcer(&self) -> &dyn Sourcer {
        self.inner().sourcer()
    }

    fn transformer(&self) -> &dyn Transformer {
        self.inner().transformer()
    }

    fn sinks_mut(&mut self) -> &mut [Box<dyn Sinker>] {
        match self {
            CollectorKind::Metric(c) => c.sinks_mut(),
            CollectorKind::Partition(c) => c.sinks_mut(),
        }
    }

    fn storer(&self) -> &dyn Storer {
        self.inner().storer()
    }
}

/// Builds a collector and its collaborators from a validated definition.
pub fn build_collector(
    config: &CollectorConfig,
    storer: Arc<dyn Storer>,
) -> Result<CollectorKind, BuildError> {
    let invalid = |reason: String| BuildError::Invalid {
        name: config.name.clone(),
        reason,
    };

    let schedule = Schedule::try_from(&config.schedule).map_err(invalid)?;
    let core = CollectorCore {
        name: config.name.clone(),
        strategy: config.invocation.strategy,
        backfill: config.invocation.backfill,
        schedule,
        sourcer: build_sourcer(&config.source)?,
        sinks: build_sinkers(config.sinks.values())?,
        storer,
    };

    match config.kind {
        CollectorType::Metric => {
            let metric = config
                .metric
                .as_ref()
                .ok_or_else(|| invalid("metric collectors need a metric section".to_string()))?;
            Ok(CollectorKind::Metric(MetricCollector::new(
                core,
                MetricEnricher::from(metric),
            )))
        }
        CollectorType::Partition => Ok(CollectorKind::Partition(
            PartitionCollector::new(core).map_err(invalid)?,
        )),
    }
}
