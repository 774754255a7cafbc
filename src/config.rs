use std::time::Duration;

use clap::Parser;

const DEFAULT_ENDPOINTS: [&str; 4] = [
    "192.168.100.101",
    "192.168.100.102",
    "192.168.100.103",
    "192.168.100.104",
];

/// Polls mining devices over HTTP and stores their telemetry in SQLite
#[derive(Parser, Debug, Clone)]
#[command(name = "minerstats", version)]
pub struct Options {
    /// Miner address (host[:port]) or full info URL, repeat or separate with commas
    #[arg(short, long = "endpoint", env = "MINERSTATS_ENDPOINTS", value_delimiter = ',',
        default_values = DEFAULT_ENDPOINTS)]
    pub endpoints: Vec<String>,

    /// Seconds to wait between the end of one cycle and the start of the next
    #[arg(short, long, env = "MINERSTATS_INTERVAL", default_value_t = 180,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// SQLite database file
    #[arg(short, long, env = "MINERSTATS_DB_PATH", default_value = "miner_stats.sqlite3")]
    pub db_path: String,

    /// Per-request timeout in seconds
    #[arg(short, long, env = "MINERSTATS_TIMEOUT", default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..=60))]
    pub timeout: u64,

    /// Do not print the latest readings table after each cycle
    #[arg(long, default_value_t = false)]
    pub no_table: bool,

    /// Print every stored reading of this hostname and exit without polling
    #[arg(long, value_name = "HOSTNAME")]
    pub history: Option<String>,
}

impl Options {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
