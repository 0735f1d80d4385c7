pub mod console;
pub mod file;
pub mod http;

pub use console::ConsoleSink;
pub use file::FileSink;
pub use http::HttpSink;

use crate::config::types::SinkConfig;
use crate::invoker::InvocationContext;
use crate::record::{Record, RecordError};
use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{uri} responded with status {status}")]
    Status { status: u16, uri: String },

    #[error("sink cancelled")]
    Cancelled,

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Destination for records. A sink is owned by exactly one collector.
#[async_trait]
pub trait Sinker: Send + Sync {
    /// Writes one record, returning the number of bytes handed to the
    /// destination.
    async fn write(
        &mut self,
        ctx: &InvocationContext,
        record: &dyn Record,
    ) -> Result<usize, SinkError>;

    /// Commits anything buffered by previous writes.
    async fn flush(&mut self, ctx: &InvocationContext) -> Result<(), SinkError>;

    async fn close(&mut self) -> Result<(), SinkError>;

    fn sink_type(&self) -> &str;
}

/// Builds the sinks of a collector in name order.
pub fn build_sinkers<'a, I>(configs: I) -> Result<Vec<Box<dyn Sinker>>, SinkError>
where
    I: IntoIterator<Item = &'a SinkConfig>,
{
    configs
        .into_iter()
        .map(|config| -> Result<Box<dyn Sinker>, SinkError> {
            match config {
                SinkConfig::Console => Ok(Box::new(ConsoleSink::new())),
                SinkConfig::File(c) => Ok(Box::new(FileSink::new(&c.path))),
                SinkConfig::Http(c) => Ok(Box::new(HttpSink::new(c)?)),
            }
        })
        .collect()
}

pub(crate) async fn until_cancelled<T, F>(ctx: &InvocationContext, fut: F) -> Result<T, SinkError>
where
    F: Future<Output = Result<T, SinkError>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(SinkError::Cancelled),
        res = fut => res,
    }
}
