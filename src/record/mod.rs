pub mod metric;
pub mod object;

pub use metric::{Metric, MetricType};
pub use object::ObjectRecord;

use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid record: {0}")]
    Invalid(String),
}

/// What a sink receives from a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bytes(Vec<u8>),
    Map(Map<String, Value>),
}

impl Payload {
    /// Bytes as written by line-oriented sinks: raw bytes untouched, maps as JSON.
    pub fn into_bytes(self) -> Result<Vec<u8>, RecordError> {
        match self {
            Payload::Bytes(bs) => Ok(bs),
            Payload::Map(m) => Ok(serde_json::to_vec(&Value::Object(m))?),
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Payload::Map(_))
    }
}

/// A single unit of sourced data that any sink can serialize.
pub trait Record: fmt::Debug + Send + Sync + 'static {
    fn payload(&self) -> Result<Payload, RecordError>;

    fn as_any(&self) -> &dyn Any;

    /// Lets transformers reach the concrete record type they know how to edit.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Ordered records produced by one source call.
#[derive(Debug, Default)]
pub struct SourceResult {
    records: Vec<Box<dyn Record>>,
}

impl SourceResult {
    pub fn new(records: Vec<Box<dyn Record>>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push<R: Record>(&mut self, record: R) {
        self.records.push(Box::new(record));
    }

    pub fn records(&self) -> &[Box<dyn Record>] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Box<dyn Record>] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R: Record> From<Vec<R>> for SourceResult {
    fn from(records: Vec<R>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| Box::new(r) as Box<dyn Record>)
                .collect(),
        }
    }
}
