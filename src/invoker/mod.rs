//! The per-collector invocation state machine.
//!
//! One `Invoker` owns one collector. Each call to [`Invoker::invoke`] runs
//! Source, Transform and Sink strictly in that order and, for windowed
//! collectors, saves the watermark only after every sink has accepted and
//! flushed the window's records. A failure at any step leaves the watermark
//! where it was, so the same window is offered again on the next firing.

mod context;

pub use context::InvocationContext;

use crate::collector::{BackfillPolicy, Collector, InvocationStrategy};
use crate::record::SourceResult;
use crate::sink::SinkError;
use crate::source::SourceError;
use crate::storage::{Invocation, StorageError};
use crate::telemetry::{MetricsRecorder, NoopRecorder, Status};
use crate::timeseries::{Clock, HistoricTumblingWindower, SystemClock, Window, WindowError};
use crate::transform::TransformError;
use chrono::SecondsFormat;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("strategy: \"{0}\" not supported")]
    UnsupportedStrategy(InvocationStrategy),

    #[error("backfilling multiple windows not yet supported: [{}]", format_windows(.0))]
    BackfillUnsupported(Vec<Window>),

    #[error("source {source_type} has no window duration, windowed collection needs one")]
    MissingWindow { source_type: String },

    #[error("invocation cancelled")]
    Cancelled,

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("state store error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Window(#[from] WindowError),
}

impl InvokeError {
    /// True when the invocation stopped because it was asked to.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            InvokeError::Cancelled
                | InvokeError::Source(SourceError::Cancelled)
                | InvokeError::Sink(SinkError::Cancelled)
        )
    }
}

fn format_windows(windows: &[Window]) -> String {
    windows
        .iter()
        .map(|w| {
            format!(
                "{} - {}",
                w.start().to_rfc3339_opts(SecondsFormat::Secs, true),
                w.end().to_rfc3339_opts(SecondsFormat::Secs, true)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where the invoker is in its cycle. Reset to `Idle` at the start of every
/// invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sourcing,
    Transforming,
    Sinking,
    WatermarkAdvanced,
    Failed,
}

/// What a successful invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A tick run delivered `records` records.
    Collected { records: usize },
    /// No full window has elapsed since the watermark.
    NotDue,
    /// These windows were delivered and the watermark now sits at the end of
    /// the last one.
    Advanced { windows: Vec<Window>, records: usize },
}

pub struct Invoker {
    collector: Box<dyn Collector>,
    clock: Arc<dyn Clock>,
    windower: HistoricTumblingWindower,
    recorder: Arc<dyn MetricsRecorder>,
    span: Span,
    phase: Phase,
}

impl Invoker {
    pub fn new(collector: Box<dyn Collector>) -> Self {
        let span = info_span!(
            "collector",
            name = %collector.name(),
            strategy = %collector.invocation_strategy()
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            collector,
            windower: HistoricTumblingWindower::new(clock.clone()),
            clock,
            recorder: Arc::new(NoopRecorder),
            span,
            phase: Phase::Idle,
        }
    }

    /// Replaces the time source used for windows and watermarks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.windower = HistoricTumblingWindower::new(clock.clone());
        self.clock = clock;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Replaces the span every event of this invoker is recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn collector(&self) -> &dyn Collector {
        self.collector.as_ref()
    }

    pub fn name(&self) -> &str {
        self.collector.name()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs one invocation of the collector's strategy.
    pub async fn invoke(&mut self, cancel: &CancellationToken) -> Result<Outcome, InvokeError> {
        let span = self.span.clone();
        let started = Instant::now();
        self.phase = Phase::Idle;

        let result = self.dispatch(cancel).instrument(span).await;

        self.recorder
            .invoke(self.collector.name(), Status::of(&result), started.elapsed());
        match &result {
            Ok(Outcome::Advanced { .. }) => self.phase = Phase::WatermarkAdvanced,
            Ok(_) => self.phase = Phase::Idle,
            Err(_) => self.phase = Phase::Failed,
        }
        result
    }

    /// Runs one invocation and logs instead of returning its error. Used by
    /// the scheduler so one collector's failure never reaches the others.
    pub async fn invoke_handle_error(&mut self, cancel: &CancellationToken) {
        if let Err(e) = self.invoke(cancel).await {
            if e.is_cancelled() {
                info!(parent: &self.span, "Invocation cancelled");
            } else {
                error!(parent: &self.span, error = %e, "Invocation failed");
            }
        }
    }

    /// Closes every sink. All sinks are closed even if some fail; the first
    /// failure is returned.
    pub async fn close(&mut self) -> Result<(), InvokeError> {
        let span = self.span.clone();
        let mut first_err = None;
        for sink in self.collector.sinks_mut().iter_mut() {
            if let Err(e) = sink.close().await {
                error!(parent: &span, sink = sink.sink_type(), error = %e, "Failed to close sink");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn dispatch(&mut self, cancel: &CancellationToken) -> Result<Outcome, InvokeError> {
        if cancel.is_cancelled() {
            return Err(InvokeError::Cancelled);
        }
        match self.collector.invocation_strategy() {
            InvocationStrategy::Tick => self.invoke_tick(cancel).await,
            InvocationStrategy::HistoricTumblingWindow => {
                self.invoke_historic_tumbling_window(cancel).await
            }
            other => Err(InvokeError::UnsupportedStrategy(other)),
        }
    }

    async fn invoke_tick(&mut self, cancel: &CancellationToken) -> Result<Outcome, InvokeError> {
        let ctx = InvocationContext::new(self.collector.name(), self.clock.now(), cancel.clone());
        debug!(id = %ctx.id(), "Invoking tick");

        let records = self.collect(&ctx).await?;
        Ok(Outcome::Collected { records })
    }

    async fn invoke_historic_tumbling_window(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Outcome, InvokeError> {
        let sourcer = self.collector.sourcer();
        let window_len = sourcer.window().ok_or_else(|| InvokeError::MissingWindow {
            source_type: sourcer.source_type().to_string(),
        })?;

        let last = self
            .collector
            .storer()
            .most_recent_invocation(self.collector.name())
            .await?;
        let last_end = last.as_ref().and_then(Invocation::end);
        let windows = self.windower.full_windows_since(last_end, window_len)?;

        match (windows.len(), self.collector.backfill_policy()) {
            (0, _) => {
                debug!(watermark = ?last_end, "No full window has elapsed");
                return Ok(Outcome::NotDue);
            }
            (1, _) => {}
            (n, BackfillPolicy::Reject) => {
                error!(windows = n, "Multiple windows detected");
                return Err(InvokeError::BackfillUnsupported(windows));
            }
            (n, BackfillPolicy::Sequential) => {
                warn!(windows = n, "Backfilling windows sequentially");
            }
        }

        let mut records = 0;
        let mut advanced = Vec::with_capacity(windows.len());
        for window in windows {
            records += self.invoke_window(cancel, window).await?;
            advanced.push(window);
        }
        Ok(Outcome::Advanced {
            windows: advanced,
            records,
        })
    }

    /// Source, transform and sink one window, then save it as the watermark.
    async fn invoke_window(
        &mut self,
        cancel: &CancellationToken,
        window: Window,
    ) -> Result<usize, InvokeError> {
        let ctx = InvocationContext::new(self.collector.name(), self.clock.now(), cancel.clone())
            .with_window(window);
        info!(id = %ctx.id(), window = %window, "Invoking for window");

        let records = self.collect(&ctx).await?;

        let invocation = Invocation {
            collector_name: self.collector.name().to_string(),
            time: self.clock.now(),
            window: Some(window),
        };
        self.collector.storer().save_invocation(&invocation).await?;
        self.phase = Phase::WatermarkAdvanced;
        self.recorder.watermark(self.collector.name(), window.end());
        debug!(id = %ctx.id(), watermark = %window.end(), "Watermark advanced");

        Ok(records)
    }

    async fn collect(&mut self, ctx: &InvocationContext) -> Result<usize, InvokeError> {
        self.phase = Phase::Sourcing;
        let mut result = self.source(ctx).await?;
        if result.is_empty() {
            warn!(id = %ctx.id(), "No results found");
        }
        ensure_active(ctx)?;

        self.phase = Phase::Transforming;
        self.collector.transformer().transform(ctx, &mut result)?;
        ensure_active(ctx)?;

        self.phase = Phase::Sinking;
        self.sink(ctx, &result).await?;
        Ok(result.len())
    }

    async fn source(&self, ctx: &InvocationContext) -> Result<SourceResult, InvokeError> {
        let sourcer = self.collector.sourcer();
        let started = Instant::now();
        let result = sourcer.source(ctx).await;

        let count = result.as_ref().map(SourceResult::len).unwrap_or(0);
        self.recorder.source(
            sourcer.source_type(),
            Status::of(&result),
            started.elapsed(),
            count,
        );
        debug!(id = %ctx.id(), records = count, "Sourced");
        Ok(result?)
    }

    /// Writes every record to every sink in sink order, then flushes each
    /// sink. The first error aborts the step.
    async fn sink(
        &mut self,
        ctx: &InvocationContext,
        result: &SourceResult,
    ) -> Result<(), InvokeError> {
        let recorder = self.recorder.clone();
        let sinks = self.collector.sinks_mut();

        for record in result.records() {
            for sink in sinks.iter_mut() {
                let started = Instant::now();
                let written = sink.write(ctx, &**record).await;
                recorder.sink(sink.sink_type(), Status::of(&written), started.elapsed());
                written?;
            }
            ensure_active(ctx)?;
        }

        for sink in sinks.iter_mut() {
            sink.flush(ctx).await?;
        }
        Ok(())
    }
}

fn ensure_active(ctx: &InvocationContext) -> Result<(), InvokeError> {
    if ctx.is_cancelled() {
        return Err(InvokeError::Cancelled);
    }
    Ok(())
}
