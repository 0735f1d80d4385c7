//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use collectord::collector::{BackfillPolicy, Collector, InvocationStrategy, Schedule};
use collectord::invoker::InvocationContext;
use collectord::record::{ObjectRecord, Record, SourceResult};
use collectord::sink::{SinkError, Sinker};
use collectord::source::{SourceError, Sourcer};
use collectord::storage::{Invocation, MemoryStore, StorageError, Storer};
use collectord::timeseries::Window;
use collectord::transform::{Noop, TransformError, Transformer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const HOUR: Duration = Duration::from_secs(3600);
pub const MINUTE: Duration = Duration::from_secs(60);
pub const QUARTER_HOUR: Duration = Duration::from_secs(15 * 60);

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

pub fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> Window {
    Window::new(start, end).unwrap()
}

/// Ordered log of everything the doubles were asked to do.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Source returning `records` object records per call, keyed by the window
/// start (or "tick"). Tracks how many calls overlap.
#[derive(Clone)]
pub struct ScriptedSource {
    pub window: Option<Duration>,
    pub records: usize,
    pub delay: Option<Duration>,
    pub fail: Arc<AtomicBool>,
    pub fail_from_call: Arc<AtomicUsize>,
    pub calls: Arc<Mutex<Vec<Option<Window>>>>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    pub log: EventLog,
}

impl ScriptedSource {
    pub fn new(window: Option<Duration>, records: usize, log: EventLog) -> Self {
        Self {
            window,
            records,
            delay: None,
            fail: Arc::new(AtomicBool::new(false)),
            fail_from_call: Arc::new(AtomicUsize::new(usize::MAX)),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            log,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fails every call from the zero-based call number `n` on.
    pub fn fail_on_call(&self, n: usize) {
        self.fail_from_call.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Option<Window>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sourcer for ScriptedSource {
    async fn source(&self, ctx: &InvocationContext) -> Result<SourceResult, SourceError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(ctx.window());
            calls.len() - 1
        };
        self.log.push("source");

        let outcome = async {
            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = ctx.cancelled() => return Err(SourceError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if self.fail.load(Ordering::SeqCst)
                || call >= self.fail_from_call.load(Ordering::SeqCst)
            {
                return Err(SourceError::Api("scripted failure".to_string()));
            }
            let key = ctx
                .window()
                .map(|w| w.start().to_rfc3339())
                .unwrap_or_else(|| "tick".to_string());
            let records: Vec<ObjectRecord> = (0..self.records)
                .map(|i| ObjectRecord::new(format!("{}#{}", key, i), i.to_string().into_bytes()))
                .collect();
            Ok(SourceResult::from(records))
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn window(&self) -> Option<Duration> {
        self.window
    }

    fn source_type(&self) -> &str {
        "scripted"
    }
}

/// Sink that logs each call as `<name>:<op>[:<key>]`.
pub struct RecordingSink {
    pub name: String,
    pub log: EventLog,
    pub fail_writes: Arc<AtomicBool>,
    pub fail_flush: Arc<AtomicBool>,
    pub cancel_on_write: Option<tokio_util::sync::CancellationToken>,
}

impl RecordingSink {
    pub fn new(name: &str, log: EventLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_flush: Arc::new(AtomicBool::new(false)),
            cancel_on_write: None,
        }
    }
}

#[async_trait]
impl Sinker for RecordingSink {
    async fn write(
        &mut self,
        _ctx: &InvocationContext,
        record: &dyn Record,
    ) -> Result<usize, SinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            self.log.push(format!("{}:write-failed", self.name));
            return Err(SinkError::Status {
                status: 500,
                uri: format!("test://{}", self.name),
            });
        }
        let key = record
            .as_any()
            .downcast_ref::<ObjectRecord>()
            .map(|r| r.key.clone())
            .unwrap_or_default();
        self.log.push(format!("{}:write:{}", self.name, key));
        if let Some(cancel) = &self.cancel_on_write {
            cancel.cancel();
        }
        Ok(record.payload()?.into_bytes()?.len())
    }

    async fn flush(&mut self, _ctx: &InvocationContext) -> Result<(), SinkError> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(SinkError::Io(std::io::Error::other("flush failed")));
        }
        self.log.push(format!("{}:flush", self.name));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.log.push(format!("{}:close", self.name));
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "recording"
    }
}

pub struct FailingTransform;

impl Transformer for FailingTransform {
    fn transform(
        &self,
        _ctx: &InvocationContext,
        _result: &mut SourceResult,
    ) -> Result<(), TransformError> {
        Err(TransformError::Failed("scripted failure".to_string()))
    }
}

/// In-memory store that counts calls and can be told to fail saves.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub saves: AtomicUsize,
    pub closes: AtomicUsize,
    pub fail_saves: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storer for CountingStore {
    async fn most_recent_invocation(
        &self,
        collector_name: &str,
    ) -> Result<Option<Invocation>, StorageError> {
        self.inner.most_recent_invocation(collector_name).await
    }

    async fn save_invocation(&self, invocation: &Invocation) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Database("scripted failure".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_invocation(invocation).await
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestCollector {
    pub name: String,
    pub strategy: InvocationStrategy,
    pub backfill: BackfillPolicy,
    pub schedule: Schedule,
    pub source: ScriptedSource,
    pub transformer: Box<dyn Transformer>,
    pub sinks: Vec<Box<dyn Sinker>>,
    pub storer: Arc<dyn Storer>,
}

impl TestCollector {
    pub fn new(
        name: &str,
        strategy: InvocationStrategy,
        source: ScriptedSource,
        storer: Arc<dyn Storer>,
    ) -> Self {
        Self {
            name: name.to_string(),
            strategy,
            backfill: BackfillPolicy::Reject,
            schedule: Schedule::Interval(HOUR),
            source,
            transformer: Box::new(Noop),
            sinks: Vec::new(),
            storer,
        }
    }

    pub fn with_sink(mut self, sink: impl Sinker + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_backfill(mut self, backfill: BackfillPolicy) -> Self {
        self.backfill = backfill;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformer = Box::new(transformer);
        self
    }
}

impl Collector for TestCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn invocation_strategy(&self) -> InvocationStrategy {
        self.strategy
    }

    fn backfill_policy(&self) -> BackfillPolicy {
        self.backfill
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn sourcer(&self) -> &dyn Sourcer {
        &self.source
    }

    fn transformer(&self) -> &dyn Transformer {
        self.transformer.as_ref()
    }

    fn sinks_mut(&mut self) -> &mut [Box<dyn Sinker>] {
        &mut self.sinks
    }

    fn storer(&self) -> &dyn Storer {
        self.storer.as_ref()
    }
}
