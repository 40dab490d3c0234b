//! Temporal and bid-settings featurizers.

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::warn;

/// Calendar features of a bid submission instant. All four fields are -1
/// when the timestamp is absent — a sentinel no real value can produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeFeatures {
    pub hour_of_day: f64,
    /// 0 = Monday.
    pub day_of_week: f64,
    pub month: f64,
    pub is_weekend: f64,
}

pub fn featurize_submission_time(ts: Option<DateTime<Utc>>) -> TimeFeatures {
    match ts {
        Some(t) => {
            let dow = t.weekday().num_days_from_monday() as f64;
            TimeFeatures {
                hour_of_day: t.hour() as f64,
                day_of_week: dow,
                month: t.month() as f64,
                is_weekend: if dow >= 5.0 { 1.0 } else { 0.0 },
            }
        }
        None => TimeFeatures {
            hour_of_day: -1.0,
            day_of_week: -1.0,
            month: -1.0,
            is_weekend: -1.0,
        },
    }
}

/// Numeric snapshot of a profile's bid settings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BidSettingsFeatures {
    pub budget: f64,
    pub duration_weeks: f64,
    pub is_fixed_price: f64,
}

/// Extract bid-settings features from a raw JSON-encoded snapshot.
///
/// Absent input, malformed JSON, or non-object content all yield the
/// all-default vector. Missing keys within a valid object fall back per key.
pub fn featurize_bid_settings(raw: Option<&str>) -> BidSettingsFeatures {
    let Some(raw) = raw else {
        return BidSettingsFeatures::default();
    };

    let val: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => {
            warn!("malformed bid_settings JSON, using defaults");
            return BidSettingsFeatures::default();
        }
    };

    let Some(obj) = val.as_object() else {
        warn!("bid_settings is not a JSON object, using defaults");
        return BidSettingsFeatures::default();
    };

    let budget = obj.get("budget").and_then(as_f64).unwrap_or(0.0);
    let duration_weeks = obj
        .get("duration_weeks")
        .and_then(as_f64)
        .map(|d| d.trunc())
        .unwrap_or(0.0);
    let is_fixed_price = match obj.get("is_fixed_price") {
        Some(serde_json::Value::Bool(true)) => 1.0,
        Some(v) if as_f64(v) == Some(1.0) => 1.0,
        _ => 0.0,
    };

    BidSettingsFeatures {
        budget,
        duration_weeks,
        is_fixed_price,
    }
}

/// Accept numbers and numeric strings — the upstream layer stores both.
fn as_f64(v: &serde_json::Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}
