use std::cmp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use log::{error, info, warn};
use thiserror::Error;

use crate::database::{Database, DatabaseError};
use crate::display;
use crate::extract::{extract, ExtractionError};
use crate::mapper::{map_fields, MappingError};
use crate::miner_client::{FetchError, MinerClient};

/// Granularity at which a sleeping collector notices the stop flag.
const STOP_POLL_STEP: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Network(#[from] FetchError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl CollectError {
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::Network(_) => "network",
            CollectError::Extraction(_) => "extraction",
            CollectError::Mapping(_) => "mapping",
            CollectError::Storage(_) => "storage",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub stored: usize,
    pub failed: usize,
}

/// Polls a fixed list of miners one after another and stores what they report.
pub struct Collector<D: Database> {
    client: MinerClient,
    endpoints: Vec<String>,
    db: D,
}

impl<D: Database> Collector<D> {
    pub fn new(client: MinerClient, endpoints: Vec<String>, db: D) -> Self {
        Collector { client, endpoints, db }
    }

    #[cfg(test)]
    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn poll_endpoint(&self, address: &str) -> Result<D::ReadingHandle, CollectError> {
        let body = self.client.fetch(address)?;
        let captured_at = Utc::now();
        let record = extract(&body)?;
        let (reading, reasons) = map_fields(record, captured_at)?;
        let handle = self.db.add_reading(&reading, &reasons)?;

        info!("[{}] {}: {} GH/s, {} rejection reasons",
            address, reading.hostname, reading.hash_rate, reasons.len());
        Ok(handle)
    }

    /// One pass over every endpoint in configured order. A failing endpoint is
    /// logged and skipped; it is tried again on the next cycle.
    pub fn poll_cycle(&self, stop: &AtomicBool) -> CycleReport {
        let mut report = CycleReport::default();

        for address in self.endpoints.iter() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            match self.poll_endpoint(address) {
                Ok(_) => report.stored += 1,
                Err(err) => {
                    warn!("[{}] {} error, skipping this cycle: {}", address, err.kind(), err);
                    report.failed += 1;
                }
            }
        }

        report
    }

    pub fn run_forever(&self, interval: Duration, stop: &AtomicBool, show_table: bool) {
        while !stop.load(Ordering::Relaxed) {
            info!("Polling {} miners at {}", self.endpoints.len(), Local::now().format("%Y-%m-%d %H:%M:%S"));

            let started = Instant::now();
            let report = self.poll_cycle(stop);
            let total = self.db.count_readings()
                .map(|count| count.to_string())
                .unwrap_or_else(|_| "?".to_string());
            info!("Cycle done in {}ms: {} stored, {} failed, {} readings in total",
                started.elapsed().as_millis(), report.stored, report.failed, total);

            if show_table {
                match self.db.get_latest_readings() {
                    Ok(latest) => println!("\n{}", display::render_table(&latest)),
                    Err(err) => error!("Could not load latest readings: {}", err),
                }
            }

            sleep_unless_stopped(interval, stop);
        }
    }
}

fn sleep_unless_stopped(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(cmp::min(deadline - now, STOP_POLL_STEP));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_database::SqliteDatabase;
    use serde_json::json;
    use std::net::TcpListener;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn miner(hostname: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hostname": hostname,
                "temp": 55.5,
                "hashRate": 987.6,
                "sharesRejectedReasons": [{"message": "Stale", "count": 2}]
            })))
            .mount(&server)
            .await;
        server
    }

    /// An address nothing listens on.
    fn unreachable_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);
        address.to_string()
    }

    fn collector(db_path: PathBuf, endpoints: Vec<String>) -> Collector<SqliteDatabase> {
        collector_with_timeout(db_path, endpoints, Duration::from_secs(2))
    }

    fn collector_with_timeout(db_path: PathBuf, endpoints: Vec<String>, timeout: Duration) -> Collector<SqliteDatabase> {
        let db = SqliteDatabase::new(db_path.to_str().unwrap()).unwrap();
        let client = MinerClient::new(timeout).unwrap();
        Collector::new(client, endpoints, db)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_miner_does_not_abort_the_cycle() {
        let first = miner("bitaxe-1").await;
        let third = miner("bitaxe-3").await;
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("stats.sqlite3");
        let endpoints = vec![first.address().to_string(), unreachable_address(), third.address().to_string()];

        let (report, hostnames, reasons) = tokio::task::spawn_blocking(move || {
            let collector = collector(db_path, endpoints);
            let report = collector.poll_cycle(&AtomicBool::new(false));
            let latest = collector.database().get_latest_readings().unwrap();
            let hostnames: Vec<String> = latest.iter().map(|stored| stored.reading.hostname.clone()).collect();
            let reasons: Vec<usize> = latest.iter().map(|stored| stored.rejection_reasons.len()).collect();
            (report, hostnames, reasons)
        }).await.unwrap();

        assert_eq!(report, CycleReport { stored: 2, failed: 1 });
        assert_eq!(hostnames, vec!["bitaxe-1".to_string(), "bitaxe-3".to_string()]);
        assert_eq!(reasons, vec![1, 1]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn each_cycle_appends_one_row_per_successful_miner() {
        let first = miner("bitaxe-1").await;
        let second = miner("bitaxe-2").await;
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("stats.sqlite3");
        let endpoints = vec![first.address().to_string(), unreachable_address(), second.address().to_string()];

        let counts = tokio::task::spawn_blocking(move || {
            let collector = collector(db_path, endpoints);
            let stop = AtomicBool::new(false);
            let mut counts = vec![collector.database().count_readings().unwrap()];
            for _ in 0..3 {
                collector.poll_cycle(&stop);
                counts.push(collector.database().count_readings().unwrap());
            }
            counts
        }).await.unwrap();

        assert_eq!(counts, vec![0, 2, 4, 6]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failures_are_classified() {
        let html = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/system/info"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_raw(r#"<html><body><pre>{"hostname": "wrapped", "hashRate": 12.9}</pre></body></html>"#, "text/html"))
            .mount(&html)
            .await;

        let broken = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&broken)
            .await;

        let garbage = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&garbage)
            .await;

        let anonymous = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"temp": 40})))
            .mount(&anonymous)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("stats.sqlite3");
        let addresses = vec![
            html.address().to_string(),
            broken.address().to_string(),
            garbage.address().to_string(),
            anonymous.address().to_string(),
        ];

        let outcomes = tokio::task::spawn_blocking(move || {
            let collector = collector(db_path, addresses.clone());
            let outcomes: Vec<&'static str> = addresses
                .iter()
                .map(|address| match collector.poll_endpoint(address) {
                    Ok(_) => "stored",
                    Err(err) => err.kind(),
                })
                .collect();
            let latest = collector.database().get_latest_readings().unwrap();
            assert_eq!(latest.len(), 1);
            assert_eq!(latest[0].reading.hostname, "wrapped");
            assert_eq!(latest[0].reading.hash_rate, 12);
            outcomes
        }).await.unwrap();

        assert_eq!(outcomes, vec!["stored", "network", "extraction", "mapping"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_miner_times_out_and_the_cycle_moves_on() {
        let first = miner("bitaxe-1").await;
        let third = miner("bitaxe-3").await;
        let slow = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_json(json!({"hostname": "sluggish"}))
                .set_delay(Duration::from_secs(5)))
            .mount(&slow)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("stats.sqlite3");
        let slow_address = slow.address().to_string();
        let endpoints = vec![first.address().to_string(), slow_address.clone(), third.address().to_string()];

        let (kind, elapsed, report, hostnames) = tokio::task::spawn_blocking(move || {
            let collector = collector_with_timeout(db_path, endpoints, Duration::from_secs(1));

            let started = Instant::now();
            let kind = collector.poll_endpoint(&slow_address).err().map(|err| err.kind());
            let elapsed = started.elapsed();

            let report = collector.poll_cycle(&AtomicBool::new(false));
            let hostnames: Vec<String> = collector.database().get_latest_readings().unwrap()
                .into_iter()
                .map(|stored| stored.reading.hostname)
                .collect();
            (kind, elapsed, report, hostnames)
        }).await.unwrap();

        assert_eq!(kind, Some("network"));
        assert!(elapsed < Duration::from_secs(4), "request took {:?}", elapsed);
        assert_eq!(report, CycleReport { stored: 2, failed: 1 });
        assert_eq!(hostnames, vec!["bitaxe-1".to_string(), "bitaxe-3".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn raised_stop_flag_skips_remaining_endpoints() {
        let first = miner("bitaxe-1").await;
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("stats.sqlite3");
        let endpoints = vec![first.address().to_string()];

        let (report, count) = tokio::task::spawn_blocking(move || {
            let collector = collector(db_path, endpoints);
            let stop = AtomicBool::new(true);
            collector.run_forever(Duration::from_secs(3600), &stop, false);
            (collector.poll_cycle(&stop), collector.database().count_readings().unwrap())
        }).await.unwrap();

        assert_eq!(report, CycleReport::default());
        assert_eq!(count, 0);
    }

    #[test]
    fn sleep_returns_early_once_stopped() {
        let stop = AtomicBool::new(true);
        let started = Instant::now();
        sleep_unless_stopped(Duration::from_secs(60), &stop);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
