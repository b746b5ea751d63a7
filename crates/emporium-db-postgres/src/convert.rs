//! Conversions between database column types and domain types.

use chrono::{DateTime, Utc};
use emporium_storage::StorageError;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::OffsetDateTime;

/// Converts chrono DateTime to time OffsetDateTime.
pub(crate) fn chrono_to_time(dt: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
        + time::Duration::nanoseconds(dt.timestamp_subsec_nanos() as i64)
}

/// Converts time OffsetDateTime to chrono DateTime.
pub(crate) fn time_to_chrono(dt: OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()).unwrap_or_default()
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value)
        .map_err(|e| StorageError::invalid_data(format!("Failed to encode column: {e}")))
}

pub(crate) fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, StorageError> {
    serde_json::from_value(value)
        .map_err(|e| StorageError::internal(format!("Failed to decode column: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_round_trips_through_chrono() {
        let now = emporium_core::now_utc();
        assert_eq!(chrono_to_time(time_to_chrono(now)), now);
    }
}
