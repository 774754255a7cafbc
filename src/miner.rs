use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;

use crate::mapper::coerce;
use crate::schema::MinerStats;

/// One telemetry snapshot of one miner.
///
/// Field names are the storage columns and the serde renames are the keys of
/// the firmware's `/api/system/info` payload, so this struct is the mapping
/// between the two. Field order must follow `schema::READING_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Deserialize, Insertable, Queryable)]
#[table_name="MinerStats"]
pub struct Reading {
    #[serde(skip_deserializing, default = "capture_instant")]
    pub timestamp: NaiveDateTime,
    #[serde(deserialize_with = "coerce::text")]
    pub hostname: String,
    #[serde(rename(deserialize = "macAddr"), default, deserialize_with = "coerce::opt_text")]
    pub mac_address: Option<String>,

    #[serde(default, deserialize_with = "coerce::opt_f64")]
    pub power: Option<f64>,
    #[serde(default, deserialize_with = "coerce::opt_f64")]
    pub voltage: Option<f64>,
    #[serde(default, deserialize_with = "coerce::opt_f64")]
    pub current: Option<f64>,
    #[serde(default, deserialize_with = "coerce::opt_f64")]
    pub temp: Option<f64>,
    #[serde(rename(deserialize = "vrTemp"), default, deserialize_with = "coerce::opt_f64")]
    pub vr_temp: Option<f64>,

    /// GH/s, truncated toward zero. Zero when the device did not report it.
    #[serde(rename(deserialize = "hashRate"), default, deserialize_with = "coerce::truncated")]
    pub hash_rate: i64,
    #[serde(rename(deserialize = "expectedHashrate"), default, deserialize_with = "coerce::opt_i32")]
    pub expected_hashrate: Option<i32>,
    #[serde(default, deserialize_with = "coerce::opt_i32")]
    pub frequency: Option<i32>,
    #[serde(rename(deserialize = "sharesAccepted"), default, deserialize_with = "coerce::opt_i64")]
    pub shares_accepted: Option<i64>,
    #[serde(rename(deserialize = "sharesRejected"), default, deserialize_with = "coerce::opt_i64")]
    pub shares_rejected: Option<i64>,
    #[serde(rename(deserialize = "uptimeSeconds"), default, deserialize_with = "coerce::opt_i64")]
    pub uptime_seconds: Option<i64>,
    #[serde(rename(deserialize = "asicCount"), default, deserialize_with = "coerce::opt_i32")]
    pub asic_count: Option<i32>,
    #[serde(rename(deserialize = "smallCoreCount"), default, deserialize_with = "coerce::opt_i32")]
    pub small_core_count: Option<i32>,
    #[serde(rename(deserialize = "ASICModel"), default, deserialize_with = "coerce::opt_text")]
    pub asic_model: Option<String>,

    #[serde(rename(deserialize = "stratumURL"), default, deserialize_with = "coerce::opt_text")]
    pub stratum_url: Option<String>,
    #[serde(rename(deserialize = "stratumPort"), default, deserialize_with = "coerce::opt_i32")]
    pub stratum_port: Option<i32>,
    #[serde(rename(deserialize = "stratumUser"), default, deserialize_with = "coerce::opt_text")]
    pub stratum_user: Option<String>,

    #[serde(default, deserialize_with = "coerce::opt_text")]
    pub version: Option<String>,
    #[serde(rename(deserialize = "idfVersion"), default, deserialize_with = "coerce::opt_text")]
    pub idf_version: Option<String>,
    #[serde(rename(deserialize = "boardVersion"), default, deserialize_with = "coerce::opt_text")]
    pub board_version: Option<String>,
    #[serde(rename(deserialize = "runningPartition"), default, deserialize_with = "coerce::opt_text")]
    pub running_partition: Option<String>,

    #[serde(default, deserialize_with = "coerce::opt_text")]
    pub ssid: Option<String>,
    #[serde(rename(deserialize = "wifiStatus"), default, deserialize_with = "coerce::opt_text")]
    pub wifi_status: Option<String>,
    #[serde(rename(deserialize = "wifiRSSI"), default, deserialize_with = "coerce::opt_i32")]
    pub wifi_rssi: Option<i32>,

    #[serde(rename(deserialize = "coreVoltage"), default, deserialize_with = "coerce::opt_i32")]
    pub core_voltage: Option<i32>,
    #[serde(rename(deserialize = "coreVoltageActual"), default, deserialize_with = "coerce::opt_i32")]
    pub core_voltage_actual: Option<i32>,
    #[serde(rename(deserialize = "bestDiff"), default, deserialize_with = "coerce::opt_text")]
    pub best_diff: Option<String>,
    #[serde(rename(deserialize = "bestSessionDiff"), default, deserialize_with = "coerce::opt_text")]
    pub best_session_diff: Option<String>,
    #[serde(rename(deserialize = "stratumDiff"), default, deserialize_with = "coerce::opt_i64")]
    pub stratum_diff: Option<i64>,
    #[serde(rename(deserialize = "maxPower"), default, deserialize_with = "coerce::opt_i32")]
    pub max_power: Option<i32>,
    #[serde(rename(deserialize = "nominalVoltage"), default, deserialize_with = "coerce::opt_i32")]
    pub nominal_voltage: Option<i32>,
    #[serde(rename(deserialize = "isUsingFallbackStratum"), default, deserialize_with = "coerce::opt_i32")]
    pub is_using_fallback_stratum: Option<i32>,
    #[serde(rename(deserialize = "isPSRAMAvailable"), default, deserialize_with = "coerce::opt_i32")]
    pub is_psram_available: Option<i32>,
    #[serde(rename(deserialize = "freeHeap"), default, deserialize_with = "coerce::opt_i64")]
    pub free_heap: Option<i64>,
    #[serde(rename(deserialize = "apEnabled"), default, deserialize_with = "coerce::opt_i32")]
    pub ap_enabled: Option<i32>,
    #[serde(default, deserialize_with = "coerce::opt_i32")]
    pub overheat_mode: Option<i32>,
    #[serde(rename(deserialize = "overclockEnabled"), default, deserialize_with = "coerce::opt_i32")]
    pub overclock_enabled: Option<i32>,

    #[serde(default, deserialize_with = "coerce::opt_text")]
    pub display: Option<String>,
    #[serde(rename(deserialize = "flipscreen"), default, deserialize_with = "coerce::opt_i32")]
    pub flip_screen: Option<i32>,
    #[serde(rename(deserialize = "invertscreen"), default, deserialize_with = "coerce::opt_i32")]
    pub invert_screen: Option<i32>,
    #[serde(rename(deserialize = "displayTimeout"), default, deserialize_with = "coerce::opt_i32")]
    pub display_timeout: Option<i32>,
    #[serde(rename(deserialize = "autofanspeed"), default, deserialize_with = "coerce::opt_i32")]
    pub auto_fan_speed: Option<i32>,
    #[serde(rename(deserialize = "fanspeed"), default, deserialize_with = "coerce::opt_i32")]
    pub fan_speed: Option<i32>,
    #[serde(rename(deserialize = "temptarget"), default, deserialize_with = "coerce::opt_i32")]
    pub temp_target: Option<i32>,
    #[serde(rename(deserialize = "fanrpm"), default, deserialize_with = "coerce::opt_i32")]
    pub fan_rpm: Option<i32>,

    #[serde(rename(deserialize = "fallbackStratumURL"), default, deserialize_with = "coerce::opt_text")]
    pub fallback_stratum_url: Option<String>,
    #[serde(rename(deserialize = "fallbackStratumPort"), default, deserialize_with = "coerce::opt_i32")]
    pub fallback_stratum_port: Option<i32>,
    #[serde(rename(deserialize = "fallbackStratumUser"), default, deserialize_with = "coerce::opt_text")]
    pub fallback_stratum_user: Option<String>,

    #[serde(rename(deserialize = "statsLimit"), default, deserialize_with = "coerce::opt_i32")]
    pub stats_limit: Option<i32>,
    #[serde(rename(deserialize = "statsDuration"), default, deserialize_with = "coerce::opt_i32")]
    pub stats_duration: Option<i32>,
}

fn capture_instant() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// A share-rejection category reported by the pool and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RejectionReason {
    pub message: String,
    pub count: u32
}

/// A reading read back from storage together with its rejection breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReading {
    pub id: i32,
    pub reading: Reading,
    pub rejection_reasons: Vec<RejectionReason>
}
