pub mod object;
pub mod prometheus;

pub use object::ObjectSource;
pub use prometheus::PrometheusSource;

use crate::config::types::SourceConfig;
use crate::invoker::InvocationContext;
use crate::record::{RecordError, SourceResult};
use crate::timeseries::WindowError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{uri} responded with status {status}")]
    Status { status: u16, uri: String },

    #[error("query failed: {0}")]
    Api(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid uri template {template:?}")]
    Template { template: String },

    #[error("source requires a window but none was set for this invocation")]
    MissingWindow,

    #[error("source cancelled")]
    Cancelled,

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Produces the records for one invocation.
#[async_trait]
pub trait Sourcer: Send + Sync {
    async fn source(&self, ctx: &InvocationContext) -> Result<SourceResult, SourceError>;

    /// Natural window length of the source. `None` means the source can only
    /// back the tick strategy.
    fn window(&self) -> Option<Duration>;

    fn source_type(&self) -> &str;
}

pub fn build_sourcer(config: &SourceConfig) -> Result<Box<dyn Sourcer>, SourceError> {
    match config {
        SourceConfig::Prometheus(c) => Ok(Box::new(PrometheusSource::new(c)?)),
        SourceConfig::Object(c) => Ok(Box::new(ObjectSource::new(c)?)),
    }
}

/// Runs `fut` unless the invocation is cancelled first.
pub(crate) async fn until_cancelled<T, F>(ctx: &InvocationContext, fut: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(SourceError::Cancelled),
        res = fut => res,
    }
}
