use super::{BackfillPolicy, Collector, CollectorCore, InvocationStrategy, Schedule};
use crate::sink::Sinker;
use crate::source::Sourcer;
use crate::storage::Storer;
use crate::transform::{Noop, Transformer};

/// Moves one raw object per window from a time-partitioned store to the
/// sinks. Always windowed.
pub struct PartitionCollector {
    core: CollectorCore,
    transformer: Noop,
}

impl PartitionCollector {
    pub fn new(core: CollectorCore) -> Result<Self, String> {
        if core.strategy != InvocationStrategy::HistoricTumblingWindow {
            return Err(format!(
                "partition collectors require the {} strategy, got {}",
                InvocationStrategy::HistoricTumblingWindow,
                core.strategy
            ));
        }
        Ok(Self {
            core,
            transformer: Noop,
        })
    }
}

impl Collector for PartitionCollector {
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
        &self.transformer
    }

    fn sinks_mut(&mut self) -> &mut [Box<dyn Sinker>] {
        &mut self.core.sinks
    }

    fn storer(&self) -> &dyn Storer {
        self.core.storer.as_ref()
    }
}
