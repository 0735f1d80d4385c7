use super::{SinkError, Sinker};
use crate::invoker::InvocationContext;
use crate::record::Record;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Appends newline-delimited records to a file.
///
/// The file is opened on the first write, so a collector that never produces
/// records never creates it.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
        }
    }

    async fn writer(&mut self) -> Result<&mut BufWriter<File>, SinkError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await?;
                tracing::debug!(path = %self.path.display(), "Opened file sink");
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }
}

#[async_trait]
impl Sinker for FileSink {
    async fn write(
        &mut self,
        _ctx: &InvocationContext,
        record: &dyn Record,
    ) -> Result<usize, SinkError> {
        let mut line = record.payload()?.into_bytes()?;
        line.push(b'\n');
        self.writer().await?.write_all(&line).await?;
        Ok(line.len())
    }

    async fn flush(&mut self, _ctx: &InvocationContext) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.shutdown().await?;
        }
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "file"
    }
}
