use super::{BackfillPolicy, Collector, CollectorCore, InvocationStrategy, Schedule};
use crate::sink::Sinker;
use crate::source::Sourcer;
use crate::storage::Storer;
use crate::transform::{MetricEnricher, Transformer};

/// Collects metrics and stamps them with the configured identity.
pub struct MetricCollector {
    core: CollectorCore,
    enricher: MetricEnricher,
}

impl MetricCollector {
    pub fn new(core: CollectorCore, enricher: MetricEnricher) -> Self {
        Self { core, enricher }
    }
}

impl Collector for MetricCollector {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn invocation_strategy(&self) -> InvocationStrategy {
        self.core.strategy
    }

    fn backfill_policy(&self) -> BackfillPolicy {
        self.core.backfill
    }

    fn schedule(&self) -> &Schedule {
        &self.core.schedule
    }

    fn sourcer(&self) -> &dyn Sourcer {
        self.core.sourcer.as_ref()
    }

    fn transformer(&self) -> &dyn Transformer {
        &self.enricher
    }

    fn sinks_mut(&mut self) -> &mut [Box<dyn Sinker>] {
        &mut self.core.sinks
    }

    fn storer(&self) -> &dyn Storer {
        self.core.storer.as_ref()
    }
}
