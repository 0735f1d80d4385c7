use super::{until_cancelled, SourceError, Sourcer};
use crate::config::types::ObjectSourceConfig;
use crate::invoker::InvocationContext;
use crate::record::{ObjectRecord, SourceResult};
use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::time::Duration;

/// Fetches one object per window from a time-partitioned location.
pub struct ObjectSource {
    client: reqwest::Client,
    template: String,
    window: Option<Duration>,
}

/// True if every `%` placeholder in `template` is a known strftime specifier.
pub fn is_valid_template(template: &str) -> bool {
    !StrftimeItems::new(template).any(|item| matches!(item, Item::Error))
}

impl ObjectSource {
    pub fn new(config: &ObjectSourceConfig) -> Result<Self, SourceError> {
        if !is_valid_template(&config.uri) {
            return Err(SourceError::Template {
                template: config.uri.clone(),
            });
        }
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            template: config.uri.clone(),
            window: config.window,
        })
    }

    /// The object location for a partition starting at `at`.
    pub fn render(&self, at: DateTime<Utc>) -> Result<String, SourceError> {
        let mut uri = String::new();
        write!(uri, "{}", at.format(&self.template)).map_err(|_| SourceError::Template {
            template: self.template.clone(),
        })?;
        Ok(uri)
    }

    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, SourceError> {
        let resp = self.client.get(uri).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                uri: uri.to_string(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Sourcer for ObjectSource {
    async fn source(&self, ctx: &InvocationContext) -> Result<SourceResult, SourceError> {
        let window = ctx.window().ok_or(SourceError::MissingWindow)?;
        let uri = self.render(window.start())?;

        tracing::debug!(uri = %uri, window = %window, "Fetching partition");
        let data = until_cancelled(ctx, self.fetch(&uri)).await?;
        Ok(SourceResult::from(vec![ObjectRecord::new(uri, data)]))
    }

    fn window(&self) -> Option<Duration> {
        self.window
    }

    fn source_type(&self) -> &str {
        "object"
    }
}
