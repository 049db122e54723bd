//! Domain objects returned by the hybrid client, plus the legacy
//! `statusschedule.php` payload that patches them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{BackendError, Result};

/// Relay `time` value the legacy API uses for "suspended indefinitely".
pub const SUSPENDED_SENTINEL: u32 = 1_576_800_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub customer_id: u64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub controllers: Vec<Controller>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneNumber {
    pub value: u32,
    pub label: String,
}

impl ZoneNumber {
    pub fn new(value: u32) -> Self {
        Self {
            value,
            label: format!("Zone {value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: u64,
    pub number: ZoneNumber,
    pub name: String,
    #[serde(default)]
    pub status: ZoneStatus,
    #[serde(default)]
    pub scheduled_runs: ScheduledRuns,
}

impl Zone {
    /// Builds a status-only zone for a relay the primary snapshot did not
    /// list. Scheduling details stay empty until the next primary fetch.
    pub fn from_relay(relay: &Relay, status: &RelayStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: relay.relay_id,
            number: ZoneNumber::new(relay.relay),
            name: relay.name.clone(),
            status: ZoneStatus {
                suspended_until: Some(status.suspended_until(now)),
                current_run_end: status.current_run_end(now),
            },
            scheduled_runs: ScheduledRuns::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneStatus {
    pub suspended_until: Option<DateTime<Utc>>,
    pub current_run_end: Option<DateTime<Utc>>,
}

impl ZoneStatus {
    pub fn is_running(&self) -> bool {
        self.current_run_end.is_some()
    }

    pub fn is_suspended_indefinitely(&self) -> bool {
        self.suspended_until == Some(DateTime::<Utc>::MAX_UTC)
    }
}

/// Scheduling detail only the primary backend knows about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRuns {
    pub summary: String,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: u64,
    pub name: String,
    pub model: SensorModel,
    #[serde(default)]
    pub status: SensorStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorModel {
    pub name: String,
    pub sensor_type: SensorType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorType {
    LevelOpen,
    LevelClosed,
    Flow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub active: bool,
    pub water_flow: Option<f64>,
}

/// One entry of the `relays` array in a `statusschedule.php` response.
///
/// `time` and `run` are kept raw: the legacy API is loose about their
/// types, and a bad value must only cost the one relay it belongs to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Relay {
    pub relay_id: u64,
    pub relay: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub time: Value,
    #[serde(default)]
    pub run: Value,
}

impl Relay {
    /// Interprets `time`/`run`, or `None` when `time` is unusable.
    pub fn status(&self) -> Option<RelayStatus> {
        let time = match seconds(&self.time)? {
            SUSPENDED_SENTINEL => RelayTime::SuspendedIndefinitely,
            secs => RelayTime::ResumesIn(secs),
        };
        let run = seconds(&self.run).filter(|secs| *secs > 0);
        Some(RelayStatus { time, run })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayTime {
    SuspendedIndefinitely,
    /// Seconds from the response until the zone resumes.
    ResumesIn(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatus {
    pub time: RelayTime,
    /// Seconds left in the current run, when watering.
    pub run: Option<u32>,
}

impl RelayStatus {
    pub fn suspended_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.time {
            RelayTime::SuspendedIndefinitely => DateTime::<Utc>::MAX_UTC,
            RelayTime::ResumesIn(secs) => offset(now, secs),
        }
    }

    pub fn current_run_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.run.map(|secs| offset(now, secs))
    }
}

fn offset(now: DateTime<Utc>, secs: u32) -> DateTime<Utc> {
    now.checked_add_signed(chrono::Duration::seconds(i64::from(secs)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Accepts integers, integral floats and numeric strings.
fn seconds(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Decoded `statusschedule.php` response.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSchedule {
    pub relays: Vec<Relay>,
    /// Advisory delay before the next poll; `None` when absent or zero.
    pub next_poll: Option<Duration>,
    /// Relays dropped because they did not decode.
    pub skipped: usize,
}

impl StatusSchedule {
    pub const PATH: &'static str = "statusschedule.php";

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut body) = value else {
            return Err(BackendError::Malformed(
                "statusschedule response is not an object".to_string(),
            ));
        };

        let next_poll = body
            .get("nextpoll")
            .and_then(seconds)
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(u64::from(secs)));

        let raw = match body.remove("relays") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(BackendError::Malformed(format!(
                    "relays should be an array, got {other}"
                )))
            }
        };

        let mut relays = Vec::with_capacity(raw.len());
        let mut skipped = 0;
        for item in raw {
            match serde_json::from_value::<Relay>(item) {
                Ok(relay) => relays.push(relay),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable relay");
                    skipped += 1;
                }
            }
        }

        Ok(Self {
            relays,
            next_poll,
            skipped,
        })
    }
}
