use crate::collector::Schedule;
use chrono::Utc;
use croner::Cron;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("invalid cron expression {expr:?}: {reason}")]
    Cron { expr: String, reason: String },

    #[error("interval must be non-zero")]
    ZeroInterval,

    #[error("cron expression {0:?} has no upcoming occurrence")]
    Exhausted(String),
}

pub fn parse_cron(expr: &str) -> Result<Cron, TriggerError> {
    Cron::new(expr).parse().map_err(|e| TriggerError::Cron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Checks that a schedule can be turned into a trigger, without needing a
/// runtime.
pub fn validate(schedule: &Schedule) -> Result<(), TriggerError> {
    match schedule {
        Schedule::Interval(period) if period.is_zero() => Err(TriggerError::ZeroInterval),
        Schedule::Interval(_) => Ok(()),
        Schedule::Cron(expr) => parse_cron(expr).map(|_| ()),
    }
}

/// Fires a collector's recurring job.
pub enum Trigger {
    /// First firing one period after creation. Firings missed while a run was
    /// in progress collapse into one, and the cadence restarts from there.
    Interval(Interval),
    Cron { expr: String, cron: Cron },
}

impl Trigger {
    pub fn from_schedule(schedule: &Schedule) -> Result<Self, TriggerError> {
        validate(schedule)?;
        match schedule {
            Schedule::Interval(period) => {
                let mut interval = interval_at(Instant::now() + *period, *period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Ok(Trigger::Interval(interval))
            }
            Schedule::Cron(expr) => Ok(Trigger::Cron {
                expr: expr.clone(),
                cron: parse_cron(expr)?,
            }),
        }
    }

    /// Waits for the next firing. Cancel safe.
    pub async fn tick(&mut self) -> Result<(), TriggerError> {
        match self {
            Trigger::Interval(interval) => {
                interval.tick().await;
                Ok(())
            }
            Trigger::Cron { expr, cron } => {
                let wait = until_next(expr, cron)?;
                tokio::time::sleep(wait).await;
                Ok(())
            }
        }
    }
}

fn until_next(expr: &str, cron: &Cron) -> Result<Duration, TriggerError> {
    let now = Utc::now();
    let next = cron
        .find_next_occurrence(&now, false)
        .map_err(|_| TriggerError::Exhausted(expr.to_string()))?;
    Ok((next - now).to_std().unwrap_or(Duration::ZERO))
}
