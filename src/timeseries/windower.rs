use super::clock::{Clock, SystemClock};
use super::window::{last_complete_window, windows_between, Window, WindowError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Computes which tumbling windows are due given the last processed window end.
#[derive(Clone)]
pub struct HistoricTumblingWindower {
    clock: Arc<dyn Clock>,
}

impl Default for HistoricTumblingWindower {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl HistoricTumblingWindower {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Full windows of length `d` that have elapsed since `last_end`.
    ///
    /// Without a previous watermark only the most recent complete window is
    /// returned. A watermark later than "now" is an error and is never
    /// corrected here.
    pub fn full_windows_since(
        &self,
        last_end: Option<DateTime<Utc>>,
        d: Duration,
    ) -> Result<Vec<Window>, WindowError> {
        let now = self.clock.now();
        match last_end {
            None => Ok(vec![last_complete_window(now, d)?]),
            Some(last_end) => windows_between(last_end, now, d),
        }
    }
}
