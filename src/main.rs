#[macro_use] extern crate diesel;
#[macro_use] extern crate diesel_migrations;
extern crate env_logger;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use log::info;

mod config;
use config::Options;

mod collector;
use collector::Collector;

mod database;
use database::Database;

mod display;
mod extract;
mod mapper;
mod miner;

mod miner_client;
use miner_client::MinerClient;

mod sqlite_database;
use sqlite_database::SqliteDatabase;

pub mod schema;


fn register_stop_flag() -> Result<Arc<AtomicBool>, String> {
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::SIGINT, signal_hook::SIGTERM].iter() {
        signal_hook::flag::register(*signal, Arc::clone(&stop))
            .map_err(|err| format!("Failed to register signal {} hook: {}", signal, err))?;
    }
    Ok(stop)
}

fn main() -> Result<(), String> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let options = Options::parse();

    if let Some(host) = &options.history {
        let database = SqliteDatabase::new(&options.db_path)
            .map_err(|err| format!("Could not open database {}: {}", options.db_path, err))?;
        let readings = database.get_readings(host)
            .map_err(|err| format!("Could not load readings of {}: {}", host, err))?;
        info!("{} readings of {} in {}", readings.len(), host, options.db_path);
        println!("{}", display::render_table(&readings));
        return Ok(());
    }

    info!("Polling {} every {}s, storing into {}",
        options.endpoints.join(", "), options.interval, options.db_path);

    let database = SqliteDatabase::new(&options.db_path)
        .map_err(|err| format!("Could not open database {}: {}", options.db_path, err))?;
    let client = MinerClient::new(options.timeout())
        .map_err(|err| format!("Could not build HTTP client: {}", err))?;
    let stop = register_stop_flag()?;

    let collector = Collector::new(client, options.endpoints.clone(), database);
    collector.run_forever(options.interval(), &stop, !options.no_table);

    info!("Stopping the collector...");
    Ok(())
}
