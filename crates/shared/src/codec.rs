//! Byte encoding for message keys and payloads.
//!
//! Absent values map to an empty body and an empty body decodes to `None`,
//! so tombstones and null keys never surface as errors. Anything else that
//! fails to parse is a [`AppError::MalformedPayload`].

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::AppError;

pub trait Codec {
    fn encode<T: Serialize>(value: Option<&T>) -> Result<Vec<u8>, AppError>;
    fn decode<T: DeserializeOwned>(bytes: Option<&[u8]>) -> Result<Option<T>, AppError>;
}

/// UTF-8 JSON bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(value: Option<&T>) -> Result<Vec<u8>, AppError> {
        match value {
            Some(value) => {
                serde_json::to_vec(value).map_err(|e| AppError::Serialization(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    fn decode<T: DeserializeOwned>(bytes: Option<&[u8]>) -> Result<Option<T>, AppError> {
        match bytes {
            None => Ok(None),
            Some(bytes) if bytes.is_empty() => Ok(None),
            Some(bytes) => serde_json::from_slice(bytes)
                .map(Some)
                .map_err(|e| AppError::MalformedPayload(e.to_string())),
        }
    }
}

/// Serde adapter for intervals written as `[d.]hh:mm:ss[.fraction]`.
pub mod timespan {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const SECONDS_PER_DAY: i64 = 86_400;

    pub fn format(value: &TimeDelta) -> String {
        let total = value.num_seconds();
        let nanos = value.subsec_nanos();
        let days = total / SECONDS_PER_DAY;
        let hours = (total % SECONDS_PER_DAY) / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        let mut out = if days > 0 {
            format!("{days}.{hours:02}:{minutes:02}:{seconds:02}")
        } else {
            format!("{hours:02}:{minutes:02}:{seconds:02}")
        };
        if nanos > 0 {
            let fraction = format!("{nanos:09}");
            out.push('.');
            out.push_str(fraction.trim_end_matches('0'));
        }
        out
    }

    pub fn parse(input: &str) -> Option<TimeDelta> {
        if input.starts_with('-') {
            return None;
        }
        let (head, tail) = input.split_once(':')?;
        let (days, hours) = match head.split_once('.') {
            Some((days, hours)) => (days.parse::<i64>().ok()?, hours),
            None => (0, head),
        };
        let hours = hours.parse::<i64>().ok()?;
        let (minutes, seconds) = tail.split_once(':')?;
        let minutes = minutes.parse::<i64>().ok()?;
        let (seconds, fraction) = match seconds.split_once('.') {
            Some((seconds, fraction)) => (seconds, Some(fraction)),
            None => (seconds, None),
        };
        let seconds = seconds.parse::<i64>().ok()?;
        if !(0..24).contains(&hours) || !(0..60).contains(&minutes) || !(0..60).contains(&seconds)
        {
            return None;
        }

        let nanos = match fraction {
            None => 0,
            Some(f) if !f.is_empty() && f.len() <= 9 && f.bytes().all(|b| b.is_ascii_digit()) => {
                f.parse::<i64>().ok()? * 10_i64.pow(9 - f.len() as u32)
            }
            Some(_) => return None,
        };

        let whole = days
            .checked_mul(SECONDS_PER_DAY)?
            .checked_add(hours * 3600 + minutes * 60 + seconds)?;
        TimeDelta::try_seconds(whole)?.checked_add(&TimeDelta::nanoseconds(nanos))
    }

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid interval '{raw}'")))
    }
}
