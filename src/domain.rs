use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// one stored sensor reading
/// append-only: created on a successful submission and never mutated
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// millisecond timestamp id, doubles as the table row key
    pub id: String,

    /// partition key (e.g., "aqi", "temperature")
    pub sensor_type: String,

    pub value: f64,

    pub location: String,

    /// free text, empty when the submitter left it out
    #[serde(default)]
    pub description: String,

    /// server-assigned ISO-8601 time of the write
    pub timestamp: String,
}

/// raw submission body as posted by the form
/// every field is optional here so that missing ones can be reported by name
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub sensor_type: Option<String>,
    /// number or numeric text
    pub value: Option<serde_json::Value>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// a submission that passed the required-field and numeric checks
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub sensor_type: String,
    pub value: f64,
    pub location: String,
    pub description: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Missing required fields: {} (sensorType, value, and location are required)", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid value: {0} is not a number")]
    NotANumber(String),
}

impl Submission {
    pub fn validate(self) -> Result<ValidSubmission, ValidationError> {
        let sensor_type = self.sensor_type.filter(|s| !s.is_empty());
        let value = self.value.filter(|v| !v.is_null() && v.as_str() != Some(""));
        let location = self.location.filter(|s| !s.is_empty());

        let (sensor_type, value, location) = match (sensor_type, value, location) {
            (Some(t), Some(v), Some(l)) => (t, v, l),
            (t, v, l) => {
                let mut missing = Vec::new();
                if t.is_none() {
                    missing.push("sensorType");
                }
                if v.is_none() {
                    missing.push("value");
                }
                if l.is_none() {
                    missing.push("location");
                }
                return Err(ValidationError::MissingFields(missing));
            }
        };

        Ok(ValidSubmission {
            sensor_type,
            value: parse_value(&value)?,
            location,
            description: self.description.unwrap_or_default(),
        })
    }
}

/// accepts 45.5 as well as "45.5"; anything non-finite is rejected
fn parse_value(raw: &serde_json::Value) -> Result<f64, ValidationError> {
    let parsed = match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::NotANumber(raw.to_string()))
}

impl Reading {
    pub fn new(submission: ValidSubmission, id: String, at: DateTime<Utc>) -> Self {
        Self {
            id,
            sensor_type: submission.sensor_type,
            value: submission.value,
            location: submission.location,
            description: submission.description,
            timestamp: iso_timestamp(at),
        }
    }
}

/// `2026-01-31T08:15:00.123Z`, same shape as javascript's toISOString
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// hands out millisecond ids that never repeat within the process
///
/// the id is the wall clock in ms; when two writes land in the same
/// millisecond (or the clock steps back) the later one takes last + 1.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, now: DateTime<Utc>) -> String {
        let now_ms = now.timestamp_millis().max(0) as u64;
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => last = actual,
            }
        }
    }
}
