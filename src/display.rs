use std::fmt::Display;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::miner::{RejectionReason, StoredReading};

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Captured (UTC)")]
    captured: String,
    #[tabled(rename = "Temp")]
    temp: String,
    #[tabled(rename = "VR Temp")]
    vr_temp: String,
    #[tabled(rename = "HashRate")]
    hash_rate: i64,
    #[tabled(rename = "Best Session Diff")]
    best_session_diff: String,
    #[tabled(rename = "Stratum Diff")]
    stratum_diff: String,
    #[tabled(rename = "Uptime")]
    uptime: String,
    #[tabled(rename = "Shares A/R")]
    shares: String,
    #[tabled(rename = "Rejected")]
    rejected: String,
}

fn cell<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn celsius(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_default()
}

fn uptime(seconds: Option<i64>) -> String {
    match seconds {
        Some(s) if s >= 0 => format!("{}d {:02}h {:02}m", s / 86_400, s % 86_400 / 3_600, s % 3_600 / 60),
        _ => String::new(),
    }
}

fn shares(accepted: Option<i64>, rejected: Option<i64>) -> String {
    match (accepted, rejected) {
        (None, None) => String::new(),
        (a, r) => format!("{}/{}", cell(a), cell(r)),
    }
}

fn rejected(reasons: &[RejectionReason]) -> String {
    reasons
        .iter()
        .map(|reason| format!("{}: {}", reason.message, reason.count))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<&StoredReading> for ReadingRow {
    fn from(stored: &StoredReading) -> Self {
        let reading = &stored.reading;
        ReadingRow {
            hostname: reading.hostname.clone(),
            captured: reading.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            temp: celsius(reading.temp),
            vr_temp: celsius(reading.vr_temp),
            hash_rate: reading.hash_rate,
            best_session_diff: cell(reading.best_session_diff.as_deref()),
            stratum_diff: cell(reading.stratum_diff),
            uptime: uptime(reading.uptime_seconds),
            shares: shares(reading.shares_accepted, reading.shares_rejected),
            rejected: rejected(&stored.rejection_reasons),
        }
    }
}

/// Grid table with one line per reading, used both for the latest reading of
/// every miner and for the history of one miner.
pub fn render_table(readings: &[StoredReading]) -> String {
    let rows: Vec<ReadingRow> = readings.iter().map(ReadingRow::from).collect();
    Table::new(rows).with(Style::ascii()).to_string()
}
