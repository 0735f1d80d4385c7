use super::{Payload, Record, RecordError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricType {
    #[serde(rename = "COUNT", alias = "count")]
    Count,
    #[default]
    #[serde(rename = "GAUGE", alias = "gauge")]
    Gauge,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Count => "COUNT",
            MetricType::Gauge => "GAUGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub uuid: Uuid,
    pub name: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,

    /// Start of the window this metric was collected for. Tick collectors
    /// leave it unset.
    pub window: Option<DateTime<Utc>>,
}

impl Metric {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: String::new(),
            value,
            metric_type: MetricType::default(),
            tags: BTreeMap::new(),
            timestamp,
            window: None,
        }
    }

    /// Build a metric from a result row. The row must carry a `value` column;
    /// every other column becomes a tag.
    pub fn from_row(
        mut row: Map<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let value = row
            .remove("value")
            .ok_or_else(|| {
                RecordError::Invalid("each row must contain a \"value\" key".to_string())
            })?;

        let value = match value {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| RecordError::Invalid(format!("value out of range: {}", n)))?,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| {
                    RecordError::Invalid(format!("unable to parse string to float: {:?}", s))
                })?,
            other => {
                return Err(RecordError::Invalid(format!(
                    "unsupported value type: {}",
                    other
                )))
            }
        };

        let mut metric = Metric::new(value, timestamp);
        for (k, v) in row {
            let tag = match v {
                Value::String(s) => s,
                Value::Null => continue,
                other => other.to_string(),
            };
            metric.tags.insert(k, tag);
        }
        Ok(metric)
    }
}

impl Record for Metric {
    fn payload(&self) -> Result<Payload, RecordError> {
        let mut m = Map::new();
        m.insert("uuid".to_string(), Value::from(self.uuid.to_string()));
        m.insert("name".to_string(), Value::from(self.name.clone()));
        m.insert("value".to_string(), Value::from(self.value));
        m.insert("type".to_string(), Value::from(self.metric_type.as_str()));
        m.insert(
            "timestamp".to_string(),
            Value::from(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        m.insert(
            "window".to_string(),
            self.window
                .map(|w| Value::from(w.to_rfc3339_opts(SecondsFormat::Secs, true)))
                .unwrap_or(Value::Null),
        );
        for (k, v) in &self.tags {
            m.insert(format!("tag.{}", k), Value::from(v.clone()));
        }
        Ok(Payload::Map(m))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
