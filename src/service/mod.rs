//! Drives every invoker on its own schedule.
//!
//! Each collector gets one task. The task runs a warm-up invocation as soon as
//! it starts and then one invocation per trigger firing, awaiting each run
//! before it waits for the next firing. Runs of one collector are therefore
//! never concurrent, while different collectors run fully in parallel.

pub mod trigger;

pub use trigger::{Trigger, TriggerError};

use crate::invoker::Invoker;
use crate::storage::{StorageError, Storer};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("collector {name}: {source}")]
    Trigger { name: String, source: TriggerError },

    #[error("duplicate collector name: {0}")]
    DuplicateCollector(String),

    #[error("service already started")]
    AlreadyStarted,

    #[error("failed to close collector {name}: {reason}")]
    Close { name: String, reason: String },

    #[error("state store error: {0}")]
    Storage(#[from] StorageError),
}

enum State {
    Ready(Vec<Invoker>),
    Running(Vec<JoinHandle<Invoker>>),
    Stopped,
}

pub struct Service {
    state: State,
    storer: Arc<dyn Storer>,
    scheduler: CancellationToken,
}

impl Service {
    /// Checks every invoker's schedule and name up front so a bad collector
    /// fails startup instead of failing silently later.
    pub fn new(invokers: Vec<Invoker>, storer: Arc<dyn Storer>) -> Result<Self, ServiceError> {
        let mut names = HashSet::new();
        for invoker in &invokers {
            let name = invoker.name();
            if !names.insert(name.to_string()) {
                return Err(ServiceError::DuplicateCollector(name.to_string()));
            }
            trigger::validate(invoker.collector().schedule()).map_err(|source| {
                ServiceError::Trigger {
                    name: name.to_string(),
                    source,
                }
            })?;
        }

        Ok(Self {
            state: State::Ready(invokers),
            storer,
            scheduler: CancellationToken::new(),
        })
    }

    /// Spawns one job per collector and returns immediately. `cancel` is
    /// handed to every invocation.
    pub fn start(&mut self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let invokers = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Ready(invokers) => invokers,
            other => {
                self.state = other;
                return Err(ServiceError::AlreadyStarted);
            }
        };

        info!(collectors = invokers.len(), "Starting collector jobs");
        let jobs = invokers
            .into_iter()
            .map(|invoker| {
                tokio::spawn(run_job(invoker, self.scheduler.clone(), cancel.clone()))
            })
            .collect();
        self.state = State::Running(jobs);
        Ok(())
    }

    /// Runs every collector until `cancel` fires, then shuts down.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), ServiceError> {
        self.start(cancel.clone())?;
        cancel.cancelled().await;
        info!("Shutdown requested");
        self.shutdown().await
    }

    /// Stops all triggers, waits for in-flight invocations, closes every
    /// invoker and finally the state store. Safe to call more than once.
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        self.scheduler.cancel();

        let invokers = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Stopped => return Ok(()),
            State::Ready(invokers) => invokers,
            State::Running(jobs) => join_all(jobs)
                .await
                .into_iter()
                .filter_map(|joined| match joined {
                    Ok(invoker) => Some(invoker),
                    Err(e) => {
                        error!(error = %e, "Collector job panicked");
                        None
                    }
                })
                .collect(),
        };

        let mut first_err = None;
        for mut invoker in invokers {
            if let Err(e) = invoker.close().await {
                if first_err.is_none() {
                    first_err = Some(ServiceError::Close {
                        name: invoker.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.storer.close().await {
            error!(error = %e, "Failed to close state store");
            if first_err.is_none() {
                first_err = Some(e.into());
            }
        }

        info!("Service stopped");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn run_job(
    mut invoker: Invoker,
    scheduler: CancellationToken,
    cancel: CancellationToken,
) -> Invoker {
    let mut trigger = match Trigger::from_schedule(invoker.collector().schedule()) {
        Ok(trigger) => trigger,
        Err(e) => {
            error!(collector = invoker.name(), error = %e, "Invalid schedule");
            return invoker;
        }
    };

    invoker.invoke_handle_error(&cancel).await;

    loop {
        tokio::select! {
            biased;
            _ = scheduler.cancelled() => break,
            _ = cancel.cancelled() => break,
            fired = trigger.tick() => {
                if let Err(e) = fired {
                    error!(collector = invoker.name(), error = %e, "Trigger stopped");
                    break;
                }
            }
        }
        invoker.invoke_handle_error(&cancel).await;
    }

    debug!(collector = invoker.name(), "Collector job stopped");
    invoker
}
