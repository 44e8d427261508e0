//! Core telemetry types for pumadash.
//!
//! This module defines the records served by the telemetry backend and the
//! response envelopes they arrive in. Field names follow the backend's
//! snake_case wire format.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

/// Formats accepted for the backend's `dt` field, tried in order.
const DT_FORMATS: &[&str] = &["%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Placeholder shown when no time can be derived.
pub const EMPTY_TIME_LABEL: &str = "--:--:--";

/// One sampled UAV observation.
///
/// Records are never mutated after decoding; each poll replaces the whole
/// collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,

    /// Human-readable datetime supplied by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<String>,

    /// Date portion supplied by some backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Altitude in meters.
    #[serde(default, deserialize_with = "null_as_default")]
    pub altitude: f64,

    /// Battery charge in percent.
    #[serde(default, deserialize_with = "null_as_default")]
    pub battery_level: f64,

    /// Current flight mode.
    #[serde(default, alias = "mode", deserialize_with = "null_as_default")]
    pub flight_mode: String,

    /// Reported system status (`Normal`, `Warning`, `Error`, ...).
    #[serde(default, deserialize_with = "null_as_default")]
    pub system_status: String,

    /// Free-form event tag.
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: String,

    /// Score assigned by the backend's anomaly detector.
    #[serde(default, deserialize_with = "null_as_default")]
    pub anomaly_score: f64,

    /// Whether the backend classified this record as anomalous.
    #[serde(default, deserialize_with = "anomaly_flag")]
    pub is_anomaly: bool,
}

/// Where a record's display time comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeSource<'a> {
    /// The backend supplied a non-empty `dt` string.
    Text(&'a str),
    /// Derived from the epoch `timestamp` in seconds.
    Epoch(f64),
}

/// How much of a time to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeStyle {
    /// Time of day only (`HH:MM:SS`).
    #[default]
    Short,
    /// Date and time (`DD/MM/YYYY HH:MM:SS`).
    Long,
}

impl TimeStyle {
    fn pattern(self) -> &'static str {
        match self {
            Self::Short => "%H:%M:%S",
            Self::Long => "%d/%m/%Y %H:%M:%S",
        }
    }
}

impl TelemetryRecord {
    /// Resolve which field provides this record's display time.
    ///
    /// `dt` wins when present and non-empty, otherwise `timestamp` is used.
    #[must_use]
    pub fn time_source(&self) -> TimeSource<'_> {
        match self.dt.as_deref().map(str::trim) {
            Some(dt) if !dt.is_empty() => TimeSource::Text(dt),
            _ => TimeSource::Epoch(self.timestamp),
        }
    }

    /// Format this record's display time.
    ///
    /// An unparseable `dt` is shown verbatim.
    #[must_use]
    pub fn time_label(&self, style: TimeStyle) -> String {
        match self.time_source() {
            TimeSource::Text(dt) => parse_dt(dt).map_or_else(
                || dt.to_string(),
                |parsed| parsed.format(style.pattern()).to_string(),
            ),
            TimeSource::Epoch(seconds) => epoch_to_local(seconds).map_or_else(
                || EMPTY_TIME_LABEL.to_string(),
                |local| local.format(style.pattern()).to_string(),
            ),
        }
    }
}

/// Convert epoch seconds to local time via milliseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn epoch_to_local(seconds: f64) -> Option<DateTime<Local>> {
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1000.0).round() as i64;
    Local.timestamp_millis_opt(millis).single()
}

/// Parse a backend `dt` string as local wall-clock time.
fn parse_dt(dt: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(dt) {
        return Some(parsed.with_timezone(&Local).naive_local());
    }
    DT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(dt, fmt).ok())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Wire forms of the anomaly flag: boolean, or integer/float 0/1.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Int(i64),
    Float(f64),
}

fn anomaly_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<WireFlag>::deserialize(deserializer)? {
        Some(WireFlag::Bool(b)) => b,
        Some(WireFlag::Int(i)) => i != 0,
        Some(WireFlag::Float(f)) => f != 0.0,
        None => false,
    })
}

/// Body of `GET /telemetry/latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestResponse {
    /// The most recent record, if the backend has any.
    #[serde(default)]
    pub latest: Option<TelemetryRecord>,
    /// The bounded history window.
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: Vec<TelemetryRecord>,
}

/// Body of `GET /telemetry`: a bare list or a counted envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListResponse {
    /// A bare newest-first array.
    Records(Vec<TelemetryRecord>),
    /// `{ data, total, anomaly_count }`.
    Envelope {
        /// Newest-first records.
        data: Vec<TelemetryRecord>,
        /// Total number of records in the backend.
        #[serde(default)]
        total: Option<u64>,
        /// Number of anomalous records in the backend.
        #[serde(default)]
        anomaly_count: Option<u64>,
    },
}

impl ListResponse {
    /// Take the records out of either shape.
    #[must_use]
    pub fn into_records(self) -> Vec<TelemetryRecord> {
        match self {
            Self::Records(records) | Self::Envelope { data: records, .. } => records,
        }
    }
}

/// Backend health, decoded from either `GET /status` or `GET /health`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HealthBody")]
pub struct HealthStatus {
    /// Whether the backend reports its datastore as reachable.
    pub connected: bool,
    /// Short status word.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Wire shape shared by both health endpoints.
///
/// `/status` sends `connected`; `/health` sends `status` and `database`
/// instead.
#[derive(Deserialize)]
struct HealthBody {
    #[serde(default)]
    connected: Option<bool>,
    #[serde(default)]
    database: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<HealthBody> for HealthStatus {
    fn from(body: HealthBody) -> Self {
        let healthy_word = body
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("healthy") || s.eq_ignore_ascii_case("ok"));
        Self {
            connected: body.connected.or(body.database).unwrap_or(healthy_word),
            status: body.status,
            message: body.message,
        }
    }
}

/// One successful fetch: the latest record and a chronological history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// The most recent record.
    pub latest: Option<TelemetryRecord>,
    /// Oldest-first history window.
    pub history: Vec<TelemetryRecord>,
}

impl Snapshot {
    /// Build a snapshot from the `/telemetry/latest` layout.
    ///
    /// History order is kept as sent; only the window is enforced, keeping
    /// the most recent `limit` records.
    #[must_use]
    pub fn from_latest(response: LatestResponse, limit: usize) -> Self {
        let mut history = response.history;
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        let latest = response.latest.or_else(|| history.last().cloned());
        Self { latest, history }
    }

    /// Build a snapshot from a newest-first `/telemetry` list.
    #[must_use]
    pub fn from_newest_first(mut records: Vec<TelemetryRecord>, limit: usize) -> Self {
        records.truncate(limit);
        let latest = records.first().cloned();
        records.reverse();
        Self {
            latest,
            history: records,
        }
    }

    /// Number of anomalous records in the history window.
    #[must_use]
    pub fn anomaly_count(&self) -> usize {
        self.history.iter().filter(|r| r.is_anomaly).count()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{history, record};
    use super::*;

    #[test]
    fn test_decode_wire_record() {
        let json = r#"{
            "timestamp": 1700000000,
            "dt": "2023/11/14 22:13:20",
            "date": "2023/11/14",
            "altitude": 152.5,
            "battery_level": 76.2,
            "flight_mode": "Loiter",
            "system_status": "Warning",
            "event": "gps_glitch",
            "anomaly_score": 0.8123,
            "is_anomaly": true
        }"#;
        let rec: TelemetryRecord = serde_json::from_str(json).unwrap();
        assert!((rec.timestamp - 1_700_000_000.0).abs() < f64::EPSILON);
        assert_eq!(rec.dt.as_deref(), Some("2023/11/14 22:13:20"));
        assert_eq!(rec.flight_mode, "Loiter");
        assert_eq!(rec.system_status, "Warning");
        assert!(rec.is_anomaly);
    }

    #[test]
    fn test_anomaly_flag_integer_forms() {
        let one: TelemetryRecord =
            serde_json::from_str(r#"{"timestamp": 1, "is_anomaly": 1}"#).unwrap();
        let zero: TelemetryRecord =
            serde_json::from_str(r#"{"timestamp": 1, "is_anomaly": 0}"#).unwrap();
        let null: TelemetryRecord =
            serde_json::from_str(r#"{"timestamp": 1, "is_anomaly": null}"#).unwrap();
        assert!(one.is_anomaly);
        assert!(!zero.is_anomaly);
        assert!(!null.is_anomaly);
    }

    #[test]
    fn test_mode_alias_and_null_fields() {
        let rec: TelemetryRecord = serde_json::from_str(
            r#"{"timestamp": 5, "mode": "RTL", "event": null, "altitude": null}"#,
        )
        .unwrap();
        assert_eq!(rec.flight_mode, "RTL");
        assert!(rec.event.is_empty());
        assert!(rec.altitude.abs() < f64::EPSILON);
    }

    #[test]
    fn test_extra_backend_columns_are_ignored() {
        let rec: TelemetryRecord = serde_json::from_str(
            r#"{"timestamp": 5, "motor_rpm_1": 4200, "gps_alt": 12.0}"#,
        )
        .unwrap();
        assert!((rec.timestamp - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_time_source_prefers_dt() {
        let mut rec = record(1_700_000_000.0);
        rec.dt = Some("2024/01/02 03:04:05".to_string());
        assert_eq!(rec.time_source(), TimeSource::Text("2024/01/02 03:04:05"));
        assert_eq!(rec.time_label(TimeStyle::Short), "03:04:05");
        assert_eq!(rec.time_label(TimeStyle::Long), "02/01/2024 03:04:05");
    }

    #[test]
    fn test_empty_dt_falls_back_to_timestamp() {
        let mut rec = record(1_700_000_000.0);
        rec.dt = Some("   ".to_string());
        assert_eq!(rec.time_source(), TimeSource::Epoch(1_700_000_000.0));
    }

    #[test]
    fn test_null_dt_uses_millisecond_conversion() {
        let rec: TelemetryRecord =
            serde_json::from_str(r#"{"timestamp": 1700000000, "dt": null}"#).unwrap();
        let expected = Local
            .timestamp_millis_opt(1_700_000_000 * 1000)
            .unwrap()
            .format("%H:%M:%S")
            .to_string();
        assert_eq!(rec.time_label(TimeStyle::Short), expected);
    }

    #[test]
    fn test_unparseable_dt_is_shown_verbatim() {
        let mut rec = record(1.0);
        rec.dt = Some("yesterday".to_string());
        assert_eq!(rec.time_label(TimeStyle::Short), "yesterday");
    }

    #[test]
    fn test_non_finite_timestamp_has_placeholder() {
        let rec = record(f64::NAN);
        assert_eq!(rec.time_label(TimeStyle::Short), EMPTY_TIME_LABEL);
    }

    #[test]
    fn test_list_response_both_shapes() {
        let bare: ListResponse =
            serde_json::from_str(r#"[{"timestamp": 2}, {"timestamp": 1}]"#).unwrap();
        assert_eq!(bare.into_records().len(), 2);

        let envelope: ListResponse = serde_json::from_str(
            r#"{"data": [{"timestamp": 2}], "total": 10, "anomaly_count": 1}"#,
        )
        .unwrap();
        assert_eq!(envelope.into_records().len(), 1);
    }

    #[test]
    fn test_snapshot_from_latest_enforces_window() {
        let response = LatestResponse {
            latest: None,
            history: history(10),
        };
        let snapshot = Snapshot::from_latest(response, 4);
        assert_eq!(snapshot.history.len(), 4);
        // Most recent records are kept, latest falls back to the last one.
        assert!((snapshot.history[0].timestamp - 1_700_000_006.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.latest.as_ref(), snapshot.history.last());
    }

    #[test]
    fn test_snapshot_from_newest_first_reverses() {
        let mut records = history(5);
        records.reverse();
        let snapshot = Snapshot::from_newest_first(records, 3);
        assert_eq!(snapshot.history.len(), 3);
        let stamps: Vec<f64> = snapshot.history.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![1_700_000_002.0, 1_700_000_003.0, 1_700_000_004.0]);
        assert!((snapshot.latest.unwrap().timestamp - 1_700_000_004.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_anomaly_count() {
        let mut records = history(4);
        records[1].is_anomaly = true;
        records[3].is_anomaly = true;
        let snapshot = Snapshot {
            latest: None,
            history: records,
        };
        assert_eq!(snapshot.anomaly_count(), 2);
    }

    #[test]
    fn test_health_status_optional_message() {
        let status: HealthStatus = serde_json::from_str(r#"{"connected": true}"#).unwrap();
        assert!(status.connected);
        assert!(status.message.is_none());
    }

    #[test]
    fn test_health_body_without_connected_field() {
        let status: HealthStatus =
            serde_json::from_str(r#"{"status": "healthy", "database": true, "model_loaded": false}"#)
                .unwrap();
        assert!(status.connected);
        assert_eq!(status.status.as_deref(), Some("healthy"));

        let status: HealthStatus =
            serde_json::from_str(r#"{"status": "healthy", "database": false}"#).unwrap();
        assert!(!status.connected);

        let status: HealthStatus = serde_json::from_str(r#"{"status": "ok"}"#).unwrap();
        assert!(status.connected);

        let status: HealthStatus = serde_json::from_str("{}").unwrap();
        assert!(!status.connected);
    }

    #[test]
    fn test_health_connected_field_wins() {
        let status: HealthStatus =
            serde_json::from_str(r#"{"connected": false, "status": "ok", "database": true}"#)
                .unwrap();
        assert!(!status.connected);
    }
}
