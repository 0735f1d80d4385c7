use super::{until_cancelled, SinkError, Sinker};
use crate::config::types::HttpSinkConfig;
use crate::invoker::InvocationContext;
use crate::record::{Payload, Record};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// POSTs every record to a fixed endpoint.
pub struct HttpSink {
    client: reqwest::Client,
    uri: String,
}

impl HttpSink {
    pub fn new(config: &HttpSinkConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            uri: config.uri.clone(),
        })
    }

    async fn post(&self, content_type: &'static str, body: Vec<u8>) -> Result<usize, SinkError> {
        let len = body.len();
        let resp = self
            .client
            .post(&self.uri)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
                uri: self.uri.clone(),
            });
        }
        Ok(len)
    }
}

#[async_trait]
impl Sinker for HttpSink {
    async fn write(
        &mut self,
        ctx: &InvocationContext,
        record: &dyn Record,
    ) -> Result<usize, SinkError> {
        let payload = record.payload()?;
        let content_type = match payload {
            Payload::Map(_) => "application/json",
            Payload::Bytes(_) => "application/octet-stream",
        };
        let body = payload.into_bytes()?;
        until_cancelled(ctx, self.post(content_type, body)).await
    }

    async fn flush(&mut self, _ctx: &InvocationContext) -> Result<(), SinkError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "http"
    }
}
