use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::miner::{Reading, RejectionReason};

const REJECTED_REASONS_KEY: &str = "sharesRejectedReasons";

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("payload carries no hostname")]
    MissingHostname,
    #[error("unexpected telemetry shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Turns an extracted `/api/system/info` object into a reading captured at
/// `captured_at` plus the rejection breakdown stored alongside it.
pub fn map_fields(mut record: Map<String, Value>, captured_at: DateTime<Utc>)
    -> Result<(Reading, Vec<RejectionReason>), MappingError> {

    match record.get("hostname") {
        None | Some(Value::Null) => return Err(MappingError::MissingHostname),
        Some(_) => {}
    }

    let reasons = match record.remove(REJECTED_REASONS_KEY) {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value::<Vec<RejectionReason>>(value)?,
    };

    let mut reading: Reading = serde_json::from_value(Value::Object(record))?;
    reading.timestamp = captured_at.naive_utc();

    Ok((reading, reasons))
}

/// Lenient field decoders. Firmware revisions disagree on whether a field is
/// an integer, a float or a boolean, so numbers are accepted in any JSON
/// numeric form and `null` always means absent.
pub mod coerce {
    use std::convert::TryFrom;

    use serde::de::{Deserialize, Deserializer, Error, Unexpected};
    use serde_json::Value;

    fn unexpected(value: &Value) -> Unexpected<'_> {
        match value {
            Value::Null => Unexpected::Unit,
            Value::Bool(b) => Unexpected::Bool(*b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => Unexpected::Float(f),
                None => Unexpected::Other("number"),
            },
            Value::String(s) => Unexpected::Str(s),
            Value::Array(_) => Unexpected::Seq,
            Value::Object(_) => Unexpected::Map,
        }
    }

    fn integer<E: Error>(value: Option<Value>) -> Result<Option<i64>, E> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b as i64)),
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Some(i));
                }
                let f = n.as_f64().unwrap_or(f64::NAN).trunc();
                // i64::MAX is not representable, the first float past it is 2^63
                if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Ok(Some(f as i64))
                } else {
                    Err(E::invalid_value(Unexpected::Other("out of range number"), &"a 64-bit integer"))
                }
            }
            Some(other) => Err(E::invalid_type(unexpected(&other), &"an integer")),
        }
    }

    fn narrow<T, E>(value: Option<i64>) -> Result<Option<T>, E>
        where T: TryFrom<i64>, E: Error {
        value
            .map(|i| T::try_from(i).map_err(|_| E::invalid_value(Unexpected::Signed(i), &"a 32-bit integer")))
            .transpose()
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        integer(Option::<Value>::deserialize(deserializer)?)
    }

    pub fn opt_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
        narrow(opt_i64(deserializer)?)
    }

    /// Integer part of a possibly fractional number; absent counts as zero.
    pub fn truncated<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(opt_i64(deserializer)?.unwrap_or(0))
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(if b { 1.0 } else { 0.0 })),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(D::Error::invalid_type(unexpected(&other), &"a number")),
        }
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(D::Error::invalid_type(unexpected(&other), &"a string")),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        opt_text(deserializer)?.ok_or_else(|| D::Error::invalid_type(Unexpected::Unit, &"a string"))
    }
}
