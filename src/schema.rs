table! {
    #[allow(non_snake_case)]
    MinerStats(id) {
        id -> Integer,
        timestamp -> Timestamp,
        hostname -> Text,
        mac_address -> Nullable<Text>,
        power -> Nullable<Double>,
        voltage -> Nullable<Double>,
        current -> Nullable<Double>,
        temp -> Nullable<Double>,
        vr_temp -> Nullable<Double>,
        hash_rate -> BigInt,
        expected_hashrate -> Nullable<Integer>,
        frequency -> Nullable<Integer>,
        shares_accepted -> Nullable<BigInt>,
        shares_rejected -> Nullable<BigInt>,
        uptime_seconds -> Nullable<BigInt>,
        asic_count -> Nullable<Integer>,
        small_core_count -> Nullable<Integer>,
        asic_model -> Nullable<Text>,
        stratum_url -> Nullable<Text>,
        stratum_port -> Nullable<Integer>,
        stratum_user -> Nullable<Text>,
        version -> Nullable<Text>,
        idf_version -> Nullable<Text>,
        board_version -> Nullable<Text>,
        running_partition -> Nullable<Text>,
        ssid -> Nullable<Text>,
        wifi_status -> Nullable<Text>,
        wifi_rssi -> Nullable<Integer>,
        core_voltage -> Nullable<Integer>,
        core_voltage_actual -> Nullable<Integer>,
        best_diff -> Nullable<Text>,
        best_session_diff -> Nullable<Text>,
        stratum_diff -> Nullable<BigInt>,
        max_power -> Nullable<Integer>,
        nominal_voltage -> Nullable<Integer>,
        is_using_fallback_stratum -> Nullable<Integer>,
        is_psram_available -> Nullable<Integer>,
        free_heap -> Nullable<BigInt>,
        ap_enabled -> Nullable<Integer>,
        overheat_mode -> Nullable<Integer>,
        overclock_enabled -> Nullable<Integer>,
        display -> Nullable<Text>,
        flip_screen -> Nullable<Integer>,
        invert_screen -> Nullable<Integer>,
        display_timeout -> Nullable<Integer>,
        auto_fan_speed -> Nullable<Integer>,
        fan_speed -> Nullable<Integer>,
        temp_target -> Nullable<Integer>,
        fan_rpm -> Nullable<Integer>,
        fallback_stratum_url -> Nullable<Text>,
        fallback_stratum_port -> Nullable<Integer>,
        fallback_stratum_user -> Nullable<Text>,
        stats_limit -> Nullable<Integer>,
        stats_duration -> Nullable<Integer>,
    }
}

table! {
    #[allow(non_snake_case)]
    ShareRejectionReasons(id) {
        id -> Integer,
        mining_stats_id -> Integer,
        message -> Text,
        count -> BigInt,
    }
}

macro_rules! reading_columns {
    ($($column:ident),* $(,)?) => {
        /// Every `MinerStats` column except `id`, in `Reading` field order.
        pub type ReadingColumns = ($(MinerStats::$column,)*);
        pub const READING_COLUMNS: ReadingColumns = ($(MinerStats::$column,)*);
    };
}

reading_columns!(
    timestamp, hostname, mac_address, power, voltage, current, temp, vr_temp, hash_rate,
    expected_hashrate, frequency, shares_accepted, shares_rejected, uptime_seconds, asic_count,
    small_core_count, asic_model, stratum_url, stratum_port, stratum_user, version, idf_version,
    board_version, running_partition, ssid, wifi_status, wifi_rssi, core_voltage,
    core_voltage_actual, best_diff, best_session_diff, stratum_diff, max_power, nominal_voltage,
    is_using_fallback_stratum, is_psram_available, free_heap, ap_enabled, overheat_mode,
    overclock_enabled, display, flip_screen, invert_screen, display_timeout, auto_fan_speed,
    fan_speed, temp_target, fan_rpm, fallback_stratum_url, fallback_stratum_port,
    fallback_stratum_user, stats_limit, stats_duration,
);

#[derive(Debug, Clone, Queryable)]
pub struct RejectionReasonDTO {
   pub id: i32,
   pub mining_stats_id: i32,
   pub message: String,
   pub count: i64
}

#[derive(Debug, Clone, Insertable)]
#[table_name="ShareRejectionReasons"]
pub struct AddRejectionReasonDTO<'a> {
   pub mining_stats_id: i32,
   pub message: &'a str,
   pub count: i64
}
