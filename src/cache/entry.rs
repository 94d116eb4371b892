//! Persisted cache entry and its expiry encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Marker written in place of an infinite expiry (JSON has no infinity).
pub const NEVER_EXPIRES: &str = "never";

/// A stored response plus its absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Epoch milliseconds; `f64::INFINITY` never expires, `None` is never valid.
    #[serde(default, with = "expiry")]
    pub cached_until: Option<f64>,
    #[serde(default)]
    pub cached_data: Value,
}

impl CacheEntry {
    pub fn new(cached_until: Option<f64>, cached_data: Value) -> Self {
        Self {
            cached_until,
            cached_data,
        }
    }

    pub fn is_valid_at(&self, now_ms: f64) -> bool {
        is_valid_until(self.cached_until, now_ms)
    }
}

/// `true` iff `cached_until` is a number strictly after `now_ms` (or +∞).
pub fn is_valid_until(cached_until: Option<f64>, now_ms: f64) -> bool {
    match cached_until {
        Some(until) => !until.is_nan() && until > now_ms,
        None => false,
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as f64
}

mod expiry {
    use super::NEVER_EXPIRES;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) if t.is_finite() => s.serialize_f64(*t),
            Some(t) if *t == f64::INFINITY => s.serialize_str(NEVER_EXPIRES),
            _ => s.serialize_none(),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Raw>::deserialize(d)? {
            Some(Raw::Number(n)) => Some(n),
            Some(Raw::Text(s)) if s == NEVER_EXPIRES => Some(f64::INFINITY),
            _ => None,
        })
    }
}
