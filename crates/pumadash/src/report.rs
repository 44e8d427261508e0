//! Text output for the one-shot commands.
//!
//! Each function returns the complete output so the binary only prints it.

use std::fmt::Write as _;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::state::HistoryLimit;
use crate::telemetry::{HealthStatus, TelemetryRecord};
use crate::view::{StatusCards, TableRow, TableView};

#[derive(Serialize)]
struct SnapshotReport<'a> {
    history_limit: HistoryLimit,
    cards: &'a StatusCards,
    anomaly_count: usize,
    total_records: usize,
    rows: &'a [TableRow],
}

fn push_table(out: &mut String, rows: &[TableRow]) {
    let _ = writeln!(
        out,
        "{:<19}  {:<7}  {:>7}  {:>8}  {:>6}  {:<10}  {:<8}  Event",
        "Time", "Status", "Score", "Alt (m)", "Batt %", "Mode", "System"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));
    for row in rows {
        let _ = writeln!(
            out,
            "{:<19}  {:<7}  {:>7}  {:>8}  {:>6}  {:<10}  {:<8}  {}",
            row.time,
            row.badge,
            row.score,
            row.altitude,
            row.battery,
            row.mode,
            row.system_status,
            row.event
        );
    }
}

fn push_plain(out: &mut String, rows: &[TableRow]) {
    for row in rows {
        let _ = writeln!(
            out,
            "{} {} score={} alt={} batt={} mode={} system={} event={}",
            row.time,
            row.badge,
            row.score,
            row.altitude,
            row.battery,
            row.mode,
            row.system_status,
            row.event
        );
    }
}

/// Format one snapshot: the status cards followed by the capped table.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn snapshot(
    cards: &StatusCards,
    table: &TableView,
    limit: HistoryLimit,
    format: OutputFormat,
) -> Result<String> {
    if format == OutputFormat::Json {
        let report = SnapshotReport {
            history_limit: limit,
            cards,
            anomaly_count: table.anomaly_count,
            total_records: table.total_records,
            rows: &table.rows,
        };
        return Ok(serde_json::to_string_pretty(&report)?);
    }

    let mut out = String::new();
    for card in cards.all() {
        let _ = writeln!(out, "{:<15} {} ({})", card.title, card.value, card.caption);
    }
    let _ = writeln!(
        out,
        "\n{} anomalies in {} records (history {limit})\n",
        table.anomaly_count, table.total_records
    );
    match format {
        OutputFormat::Table => push_table(&mut out, &table.rows),
        _ => push_plain(&mut out, &table.rows),
    }
    Ok(out)
}

/// Format the backend's anomaly list.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn anomalies(records: &[TelemetryRecord], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(records)?);
    }
    let rows: Vec<TableRow> = records.iter().map(TableRow::from_record).collect();
    let mut out = String::new();
    if rows.is_empty() {
        out.push_str("No anomalies reported.\n");
        return Ok(out);
    }
    match format {
        OutputFormat::Table => push_table(&mut out, &rows),
        _ => push_plain(&mut out, &rows),
    }
    let _ = writeln!(out, "\n{} anomalies", rows.len());
    Ok(out)
}

/// Format a health probe result.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn health(base_url: &str, status: &HealthStatus, json: bool) -> Result<String> {
    if json {
        let value = serde_json::json!({
            "base_url": base_url,
            "connected": status.connected,
            "status": status.status,
            "message": status.message,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let mut out = String::new();
    let _ = writeln!(out, "pumadash status");
    let _ = writeln!(out, "---------------");
    let _ = writeln!(out, "Backend:    {base_url}");
    let _ = writeln!(
        out,
        "Connected:  {}",
        if status.connected { "yes" } else { "no" }
    );
    if let Some(s) = &status.status {
        let _ = writeln!(out, "Status:     {s}");
    }
    if let Some(m) = &status.message {
        let _ = writeln!(out, "Message:    {m}");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::fixtures::history;

    fn sample() -> (StatusCards, TableView) {
        let mut records = history(20);
        records[19].is_anomaly = true;
        records[19].event = "gps_loss".to_string();
        (
            StatusCards::from_latest(records.last()),
            TableView::from_history(&records, 5),
        )
    }

    #[test]
    fn test_snapshot_table() {
        let (cards, table) = sample();
        let out = snapshot(&cards, &table, HistoryLimit::Last50, OutputFormat::Table).unwrap();
        assert!(out.contains("System Status   ANOMALY (ML Detection)"));
        assert!(out.contains("1 anomalies in 20 records (history 50)"));
        assert!(out.contains("gps_loss"));
        // header, rule and five rows after the summary
        let after = out.split("(history 50)").nth(1).unwrap();
        assert_eq!(after.trim().lines().count(), 7);
    }

    #[test]
    fn test_snapshot_plain() {
        let (cards, table) = sample();
        let out = snapshot(&cards, &table, HistoryLimit::Last50, OutputFormat::Plain).unwrap();
        assert!(out.contains("ANOMALY score=0.1000 alt=120.00 batt=90.0 mode=Auto"));
        assert!(out.contains("event=-"));
    }

    #[test]
    fn test_snapshot_json() {
        let (cards, table) = sample();
        let out = snapshot(&cards, &table, HistoryLimit::Last100, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["history_limit"], 100);
        assert_eq!(value["anomaly_count"], 1);
        assert_eq!(value["rows"].as_array().unwrap().len(), 5);
        assert_eq!(value["cards"]["system"]["value"], "ANOMALY");
    }

    #[test]
    fn test_anomalies_empty() {
        let out = anomalies(&[], OutputFormat::Table).unwrap();
        assert_eq!(out, "No anomalies reported.\n");
    }

    #[test]
    fn test_anomalies_json_keeps_records() {
        let records = history(2);
        let out = anomalies(&records, OutputFormat::Json).unwrap();
        let back: Vec<TelemetryRecord> = serde_json::from_str(&out).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_health_plain_and_json() {
        let status = HealthStatus {
            connected: false,
            status: Some("degraded".to_string()),
            message: None,
        };
        let out = health("http://localhost:5000", &status, false).unwrap();
        assert!(out.contains("Connected:  no"));
        assert!(out.contains("Status:     degraded"));

        let out = health("http://localhost:5000", &status, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["connected"], false);
        assert_eq!(value["base_url"], "http://localhost:5000");
    }
}
