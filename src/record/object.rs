use super::{Payload, Record, RecordError};
use std::any::Any;

/// An opaque object fetched whole from storage, such as one time partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub key: String,
    pub data: Vec<u8>,
}

impl ObjectRecord {
    pub fn new(key: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            data,
        }
    }
}

impl Record for ObjectRecord {
    fn payload(&self) -> Result<Payload, RecordError> {
        Ok(Payload::Bytes(self.data.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
