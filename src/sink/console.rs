use super::{SinkError, Sinker};
use crate::invoker::InvocationContext;
use crate::record::Record;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Writes each record as one line on stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sinker for ConsoleSink {
    async fn write(
        &mut self,
        _ctx: &InvocationContext,
        record: &dyn Record,
    ) -> Result<usize, SinkError> {
        let mut line = record.payload()?.into_bytes()?;
        line.push(b'\n');

        let mut out = tokio::io::stdout();
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(line.len())
    }

    async fn flush(&mut self, _ctx: &InvocationContext) -> Result<(), SinkError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "console"
    }
}
