//! Presentation values derived from [`DashboardState`].
//!
//! Everything here is a pure function of the state. The terminal renderer
//! and the one-shot report printer both draw from a [`DashboardView`].

use std::fmt;

use serde::Serialize;

use crate::state::{DashboardState, HistoryLimit};
use crate::telemetry::{TelemetryRecord, TimeStyle, EMPTY_TIME_LABEL};

/// Battery level assumed before the first record arrives.
const DEFAULT_BATTERY_LEVEL: f64 = 100.0;

/// Flight mode shown before the first record arrives.
const DEFAULT_FLIGHT_MODE: &str = "Auto";

/// Severity tier a displayed value maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTier {
    /// Nominal.
    Normal,
    /// Needs attention.
    Warning,
    /// Anomalous or failing.
    Critical,
}

/// Anomaly classification badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnomalyBadge {
    /// Classified normal.
    Normal,
    /// Classified anomalous.
    Anomaly,
}

impl AnomalyBadge {
    /// Badge for an anomaly flag.
    #[must_use]
    pub fn from_flag(is_anomaly: bool) -> Self {
        if is_anomaly {
            Self::Anomaly
        } else {
            Self::Normal
        }
    }

    /// Display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Anomaly => "ANOMALY",
        }
    }

    /// Color tier.
    #[must_use]
    pub fn tier(self) -> ColorTier {
        match self {
            Self::Normal => ColorTier::Normal,
            Self::Anomaly => ColorTier::Critical,
        }
    }
}

impl fmt::Display for AnomalyBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Battery band: ≥80 full, ≥50 good, ≥20 low, otherwise critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatteryBand {
    /// 80% and above.
    FullyCharged,
    /// 50% up to 80%.
    Good,
    /// 20% up to 50%.
    Low,
    /// Below 20%.
    Critical,
}

impl BatteryBand {
    /// Band for a battery percentage.
    #[must_use]
    pub fn from_level(level: f64) -> Self {
        if level >= 80.0 {
            Self::FullyCharged
        } else if level >= 50.0 {
            Self::Good
        } else if level >= 20.0 {
            Self::Low
        } else {
            Self::Critical
        }
    }

    /// Display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::FullyCharged => "Fully Charged",
            Self::Good => "Good",
            Self::Low => "Low",
            Self::Critical => "Critical",
        }
    }

    /// Color tier.
    #[must_use]
    pub fn tier(self) -> ColorTier {
        match self {
            Self::FullyCharged | Self::Good => ColorTier::Normal,
            Self::Low => ColorTier::Warning,
            Self::Critical => ColorTier::Critical,
        }
    }
}

/// Badge for a record's reported system status.
#[must_use]
pub fn system_status_tier(status: &str) -> ColorTier {
    match status.trim() {
        s if s.eq_ignore_ascii_case("error") => ColorTier::Critical,
        s if s.eq_ignore_ascii_case("warning") => ColorTier::Warning,
        _ => ColorTier::Normal,
    }
}

/// One status card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    /// Card heading.
    pub title: &'static str,
    /// Main value.
    pub value: String,
    /// Caption under the value.
    pub caption: String,
    /// Tier the value is colored by.
    pub tier: ColorTier,
}

/// The five status cards, in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCards {
    /// ML detection result for the latest record.
    pub system: Card,
    /// Time of the latest record.
    pub timestamp: Card,
    /// Current altitude.
    pub altitude: Card,
    /// Current battery level.
    pub battery: Card,
    /// Current flight mode.
    pub flight_mode: Card,
}

impl StatusCards {
    /// Derive the cards from the latest record.
    #[must_use]
    pub fn from_latest(latest: Option<&TelemetryRecord>) -> Self {
        let badge = AnomalyBadge::from_flag(latest.is_some_and(|r| r.is_anomaly));
        let battery_level = latest.map_or(DEFAULT_BATTERY_LEVEL, |r| r.battery_level);
        let band = BatteryBand::from_level(battery_level);

        Self {
            system: Card {
                title: "System Status",
                value: badge.label().to_string(),
                caption: "ML Detection".to_string(),
                tier: badge.tier(),
            },
            timestamp: Card {
                title: "Timestamp",
                value: latest.map_or_else(
                    || EMPTY_TIME_LABEL.to_string(),
                    |r| r.time_label(TimeStyle::Short),
                ),
                caption: "Real-time".to_string(),
                tier: ColorTier::Normal,
            },
            altitude: Card {
                title: "Altitude",
                value: format!("{:.1} m", latest.map_or(0.0, |r| r.altitude)),
                caption: "Current Height".to_string(),
                tier: ColorTier::Normal,
            },
            battery: Card {
                title: "Battery Level",
                value: format!("{battery_level:.1} %"),
                caption: band.label().to_string(),
                tier: band.tier(),
            },
            flight_mode: Card {
                title: "Flight Mode",
                value: latest
                    .map(|r| r.flight_mode.trim())
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_FLIGHT_MODE)
                    .to_string(),
                caption: "Current Mode".to_string(),
                tier: ColorTier::Normal,
            },
        }
    }

    /// Cards in display order.
    #[must_use]
    pub fn all(&self) -> [&Card; 5] {
        [
            &self.system,
            &self.timestamp,
            &self.altitude,
            &self.battery,
            &self.flight_mode,
        ]
    }
}

/// Closed value range of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
}

impl Bounds {
    /// Bounds of `values`, widened so `min < max` always holds.
    #[must_use]
    pub fn of(values: impl IntoIterator<Item = f64>) -> Self {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            return Self { min: 0.0, max: 1.0 };
        }
        if (max - min).abs() < f64::EPSILON {
            return Self {
                min: min - 0.5,
                max: max + 0.5,
            };
        }
        Self { min, max }
    }

    /// Map `value` into `0.0..=1.0` relative to these bounds.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

/// One plotted anomaly score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePoint {
    /// Position in the history window.
    pub x: f64,
    /// Anomaly score.
    pub score: f64,
    /// Drawn with a larger marker.
    pub emphasized: bool,
}

/// Anomaly score over the history window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalySeries {
    /// One point per history record, oldest first.
    pub points: Vec<ScorePoint>,
    /// Score range.
    pub bounds: Bounds,
}

impl AnomalySeries {
    /// Plot the scores of `history`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_history(history: &[TelemetryRecord]) -> Self {
        let points: Vec<ScorePoint> = history
            .iter()
            .enumerate()
            .map(|(i, r)| ScorePoint {
                x: i as f64,
                score: r.anomaly_score,
                emphasized: r.is_anomaly,
            })
            .collect();
        let bounds = Bounds::of(points.iter().map(|p| p.score));
        Self { points, bounds }
    }

    /// `(x, score)` pairs for the whole line.
    #[must_use]
    pub fn line(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.x, p.score)).collect()
    }

    /// `(x, score)` pairs for emphasized points only.
    #[must_use]
    pub fn emphasized(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter(|p| p.emphasized)
            .map(|p| (p.x, p.score))
            .collect()
    }
}

/// A series plotted against its own y-axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledSeries {
    /// Series name with unit.
    pub name: &'static str,
    /// `(x, value)` pairs, oldest first.
    pub points: Vec<(f64, f64)>,
    /// This series' own value range.
    pub bounds: Bounds,
}

impl ScaledSeries {
    #[allow(clippy::cast_precision_loss)]
    fn from_history(
        name: &'static str,
        history: &[TelemetryRecord],
        value: impl Fn(&TelemetryRecord) -> f64,
    ) -> Self {
        let points: Vec<(f64, f64)> = history
            .iter()
            .enumerate()
            .map(|(i, r)| (i as f64, value(r)))
            .collect();
        let bounds = Bounds::of(points.iter().map(|(_, v)| *v));
        Self {
            name,
            points,
            bounds,
        }
    }

    /// Points rescaled into `0.0..=1.0` for a shared plot area.
    #[must_use]
    pub fn normalized(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|(x, v)| (*x, self.bounds.normalize(*v)))
            .collect()
    }
}

/// Altitude and battery over the history window on independent scales.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSeries {
    /// Altitude, left axis.
    pub altitude: ScaledSeries,
    /// Battery level, right axis.
    pub battery: ScaledSeries,
}

impl MetricsSeries {
    /// Plot altitude and battery of `history`.
    #[must_use]
    pub fn from_history(history: &[TelemetryRecord]) -> Self {
        Self {
            altitude: ScaledSeries::from_history("Altitude (m)", history, |r| r.altitude),
            battery: ScaledSeries::from_history("Battery (%)", history, |r| r.battery_level),
        }
    }
}

/// One telemetry table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    /// Long-form record time.
    pub time: String,
    /// Anomaly badge.
    pub badge: AnomalyBadge,
    /// Score with four decimals.
    pub score: String,
    /// Altitude with two decimals.
    pub altitude: String,
    /// Battery with one decimal.
    pub battery: String,
    /// Flight mode.
    pub mode: String,
    /// Reported system status.
    pub system_status: String,
    /// Tier of the system status badge.
    pub system_tier: ColorTier,
    /// Event tag, `-` when empty.
    pub event: String,
}

impl TableRow {
    /// Format one record.
    #[must_use]
    pub fn from_record(record: &TelemetryRecord) -> Self {
        let event = record.event.trim();
        Self {
            time: record.time_label(TimeStyle::Long),
            badge: AnomalyBadge::from_flag(record.is_anomaly),
            score: format!("{:.4}", record.anomaly_score),
            altitude: format!("{:.2}", record.altitude),
            battery: format!("{:.1}", record.battery_level),
            mode: record.flight_mode.clone(),
            system_status: record.system_status.clone(),
            system_tier: system_status_tier(&record.system_status),
            event: if event.is_empty() {
                "-".to_string()
            } else {
                event.to_string()
            },
        }
    }
}

/// The capped, newest-first telemetry table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    /// At most `cap` rows, newest first.
    pub rows: Vec<TableRow>,
    /// Anomalous records in the full held history.
    pub anomaly_count: usize,
    /// Records in the full held history.
    pub total_records: usize,
}

impl TableView {
    /// Build the table over `history`, showing at most `cap` rows.
    #[must_use]
    pub fn from_history(history: &[TelemetryRecord], cap: usize) -> Self {
        Self {
            rows: history
                .iter()
                .rev()
                .take(cap)
                .map(TableRow::from_record)
                .collect(),
            anomaly_count: history.iter().filter(|r| r.is_anomaly).count(),
            total_records: history.len(),
        }
    }
}

/// Connectivity line at the top of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    /// Combined connectivity indicator.
    pub connected: bool,
    /// Time of the last applied snapshot.
    pub last_update: String,
    /// Active history window.
    pub history_limit: HistoryLimit,
    /// Last failure, shown only while disconnected.
    pub error: Option<String>,
}

impl Header {
    /// Indicator text.
    #[must_use]
    pub fn status_label(&self) -> &'static str {
        if self.connected {
            "● Connected"
        } else {
            "● Disconnected"
        }
    }

    /// Indicator tier.
    #[must_use]
    pub fn tier(&self) -> ColorTier {
        if self.connected {
            ColorTier::Normal
        } else {
            ColorTier::Critical
        }
    }
}

/// Options that shape the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    /// Maximum table rows.
    pub table_rows: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self { table_rows: 50 }
    }
}

/// Everything the dashboard draws, derived from one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// Connectivity header.
    pub header: Header,
    /// Status cards.
    pub cards: StatusCards,
    /// Anomaly score chart.
    pub anomaly: AnomalySeries,
    /// Altitude and battery chart.
    pub metrics: MetricsSeries,
    /// Short time labels of the first and last history records.
    pub time_span: Option<(String, String)>,
    /// Telemetry table.
    pub table: TableView,
}

impl DashboardView {
    /// Derive the full view.
    #[must_use]
    pub fn from_state(state: &DashboardState, options: ViewOptions) -> Self {
        let history = state.history.as_slice();
        let time_span = history.first().zip(history.last()).map(|(first, last)| {
            (
                first.time_label(TimeStyle::Short),
                last.time_label(TimeStyle::Short),
            )
        });
        let connected = state.is_connected();

        Self {
            header: Header {
                connected,
                last_update: state.last_update_label(),
                history_limit: state.history_limit,
                error: if connected {
                    None
                } else {
                    state.last_error.clone()
                },
            },
            cards: StatusCards::from_latest(state.latest.as_ref()),
            anomaly: AnomalySeries::from_history(history),
            metrics: MetricsSeries::from_history(history),
            time_span,
            table: TableView::from_history(history, options.table_rows),
        }
    }

    /// Whether there is any history to chart.
    #[must_use]
    pub fn has_history(&self) -> bool {
        self.table.total_records > 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;
    use crate::telemetry::fixtures::{history, record};
    use crate::telemetry::Snapshot;

    fn state_with(history: Vec<TelemetryRecord>) -> DashboardState {
        let mut state = DashboardState::default();
        state.apply_health(true);
        state.apply_snapshot(
            1,
            Snapshot {
                latest: history.last().cloned(),
                history,
            },
            Local::now(),
        );
        state
    }

    #[test]
    fn test_anomaly_badge_labels_and_tiers() {
        let anomaly = AnomalyBadge::from_flag(true);
        let normal = AnomalyBadge::from_flag(false);
        assert_eq!(anomaly.label(), "ANOMALY");
        assert_eq!(normal.label(), "NORMAL");
        assert_ne!(anomaly.tier(), normal.tier());
    }

    #[test]
    fn test_system_card_follows_latest_flag() {
        let mut rec = record(1.0);
        rec.is_anomaly = true;
        let cards = StatusCards::from_latest(Some(&rec));
        assert_eq!(cards.system.value, "ANOMALY");
        assert_eq!(cards.system.tier, ColorTier::Critical);

        rec.is_anomaly = false;
        let cards = StatusCards::from_latest(Some(&rec));
        assert_eq!(cards.system.value, "NORMAL");
        assert_eq!(cards.system.tier, ColorTier::Normal);
    }

    #[test]
    fn test_battery_bands() {
        assert_eq!(BatteryBand::from_level(85.0).label(), "Fully Charged");
        assert_eq!(BatteryBand::from_level(80.0).label(), "Fully Charged");
        assert_eq!(BatteryBand::from_level(65.0).label(), "Good");
        assert_eq!(BatteryBand::from_level(45.0).label(), "Low");
        assert_eq!(BatteryBand::from_level(20.0).label(), "Low");
        assert_eq!(BatteryBand::from_level(5.0).label(), "Critical");
    }

    #[test]
    fn test_battery_tiers_are_ordered() {
        assert_eq!(BatteryBand::FullyCharged.tier(), ColorTier::Normal);
        assert_eq!(BatteryBand::Good.tier(), ColorTier::Normal);
        assert_eq!(BatteryBand::Low.tier(), ColorTier::Warning);
        assert_eq!(BatteryBand::Critical.tier(), ColorTier::Critical);
    }

    #[test]
    fn test_cards_before_first_fetch() {
        let cards = StatusCards::from_latest(None);
        assert_eq!(cards.system.value, "NORMAL");
        assert_eq!(cards.timestamp.value, "--:--:--");
        assert_eq!(cards.altitude.value, "0.0 m");
        assert_eq!(cards.battery.value, "100.0 %");
        assert_eq!(cards.battery.caption, "Fully Charged");
        assert_eq!(cards.flight_mode.value, "Auto");
    }

    #[test]
    fn test_cards_format_latest() {
        let mut rec = record(1_700_000_000.0);
        rec.altitude = 152.46;
        rec.battery_level = 18.04;
        rec.flight_mode = "Loiter".to_string();
        let cards = StatusCards::from_latest(Some(&rec));
        assert_eq!(cards.altitude.value, "152.5 m");
        assert_eq!(cards.battery.value, "18.0 %");
        assert_eq!(cards.battery.caption, "Critical");
        assert_eq!(cards.battery.tier, ColorTier::Critical);
        assert_eq!(cards.flight_mode.value, "Loiter");
        assert_eq!(cards.all().len(), 5);
    }

    #[test]
    fn test_timestamp_card_uses_epoch_when_dt_missing() {
        let rec = record(1_700_000_000.0);
        let cards = StatusCards::from_latest(Some(&rec));
        let expected = Local
            .timestamp_millis_opt(1_700_000_000_000)
            .unwrap()
            .format("%H:%M:%S")
            .to_string();
        assert_eq!(cards.timestamp.value, expected);
    }

    #[test]
    fn test_system_status_tiers() {
        assert_eq!(system_status_tier("Error"), ColorTier::Critical);
        assert_eq!(system_status_tier("warning"), ColorTier::Warning);
        assert_eq!(system_status_tier("Normal"), ColorTier::Normal);
        assert_eq!(system_status_tier(""), ColorTier::Normal);
    }

    #[test]
    fn test_bounds() {
        let b = Bounds::of([3.0, -1.0, 2.0]);
        assert!((b.min + 1.0).abs() < f64::EPSILON);
        assert!((b.max - 3.0).abs() < f64::EPSILON);
        assert!((b.normalize(1.0) - 0.5).abs() < f64::EPSILON);

        let flat = Bounds::of([4.0, 4.0]);
        assert!(flat.min < flat.max);

        let empty = Bounds::of(std::iter::empty());
        assert!((empty.max - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_anomaly_series_emphasis() {
        let mut records = history(5);
        records[2].is_anomaly = true;
        records[2].anomaly_score = 0.9;
        let series = AnomalySeries::from_history(&records);
        assert_eq!(series.line().len(), 5);
        assert_eq!(series.emphasized(), vec![(2.0, 0.9)]);
        assert!((series.bounds.max - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_have_independent_scales() {
        let mut records = history(3);
        for (i, r) in records.iter_mut().enumerate() {
            r.altitude = 100.0 * (i as f64 + 1.0);
            r.battery_level = 90.0 - i as f64;
        }
        let metrics = MetricsSeries::from_history(&records);
        assert!((metrics.altitude.bounds.max - 300.0).abs() < f64::EPSILON);
        assert!((metrics.battery.bounds.min - 88.0).abs() < f64::EPSILON);
        let norm = metrics.battery.normalized();
        assert!((norm[0].1 - 1.0).abs() < f64::EPSILON);
        assert!(norm[2].1.abs() < f64::EPSILON);
    }

    #[test]
    fn test_table_is_capped_newest_first() {
        let mut records = history(120);
        records[0].is_anomaly = true;
        records[119].is_anomaly = true;
        let table = TableView::from_history(&records, 50);
        assert_eq!(table.rows.len(), 50);
        assert_eq!(table.total_records, 120);
        // Counted over the full history, not the capped rows.
        assert_eq!(table.anomaly_count, 2);
        assert_eq!(table.rows[0].badge, AnomalyBadge::Anomaly);
    }

    #[test]
    fn test_table_row_formatting() {
        let mut rec = record(1.0);
        rec.anomaly_score = 0.123_456;
        rec.altitude = 10.0;
        rec.battery_level = 55.55;
        rec.system_status = "Warning".to_string();
        let row = TableRow::from_record(&rec);
        assert_eq!(row.score, "0.1235");
        assert_eq!(row.altitude, "10.00");
        assert_eq!(row.battery, "55.5");
        assert_eq!(row.system_tier, ColorTier::Warning);
        assert_eq!(row.event, "-");
    }

    #[test]
    fn test_table_time_uses_per_record_fallback() {
        let mut records = history(2);
        records[1].dt = Some("2024/05/06 07:08:09".to_string());
        let table = TableView::from_history(&records, 10);
        assert_eq!(table.rows[0].time, "06/05/2024 07:08:09");
        let expected = Local
            .timestamp_millis_opt(1_700_000_000_000)
            .unwrap()
            .format("%d/%m/%Y %H:%M:%S")
            .to_string();
        assert_eq!(table.rows[1].time, expected);
    }

    #[test]
    fn test_view_from_state() {
        let state = state_with(history(80));
        let view = DashboardView::from_state(&state, ViewOptions { table_rows: 15 });
        assert!(view.header.connected);
        assert_eq!(view.header.status_label(), "● Connected");
        assert!(view.header.error.is_none());
        assert_eq!(view.table.rows.len(), 15);
        assert_eq!(view.anomaly.points.len(), 80);
        assert!(view.time_span.is_some());
        assert!(view.has_history());
    }

    #[test]
    fn test_view_of_empty_state() {
        let view = DashboardView::from_state(&DashboardState::default(), ViewOptions::default());
        assert!(!view.has_history());
        assert!(view.time_span.is_none());
        assert_eq!(view.header.last_update, "--:--:--");
        assert_eq!(view.header.tier(), ColorTier::Critical);
    }

    #[test]
    fn test_view_shows_error_only_when_disconnected() {
        let mut state = state_with(history(3));
        state.apply_fetch_failure(2, &crate::error::Error::internal("backend down"));
        let view = DashboardView::from_state(&state, ViewOptions::default());
        assert!(!view.header.connected);
        assert!(view.header.error.as_deref().unwrap().contains("backend down"));
        // Stale data is still shown.
        assert_eq!(view.table.total_records, 3);
    }
}
