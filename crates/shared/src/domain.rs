use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A rental as it travels over the broker.
///
/// Fields are private so the positivity invariants checked in [`RentalEvent::new`]
/// cannot be broken afterwards. Decoding goes through the same check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRentalEvent")]
pub struct RentalEvent {
    renter_id: i32,
    bike_id: i32,
    start_time: DateTime<Utc>,
    #[serde(with = "crate::codec::timespan")]
    duration: TimeDelta,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRentalEvent {
    renter_id: i32,
    bike_id: i32,
    start_time: DateTime<Utc>,
    #[serde(with = "crate::codec::timespan")]
    duration: TimeDelta,
}

impl TryFrom<RawRentalEvent> for RentalEvent {
    type Error = AppError;

    fn try_from(raw: RawRentalEvent) -> Result<Self, Self::Error> {
        RentalEvent::new(raw.renter_id, raw.bike_id, raw.start_time, raw.duration)
    }
}

impl RentalEvent {
    pub fn new(
        renter_id: i32,
        bike_id: i32,
        start_time: DateTime<Utc>,
        duration: TimeDelta,
    ) -> Result<Self, AppError> {
        if renter_id <= 0 {
            return Err(AppError::InvalidEvent(format!(
                "renterId must be positive, got {renter_id}"
            )));
        }
        if bike_id <= 0 {
            return Err(AppError::InvalidEvent(format!(
                "bikeId must be positive, got {bike_id}"
            )));
        }
        if duration <= TimeDelta::zero() {
            return Err(AppError::InvalidEvent(format!(
                "duration must be positive, got {duration}"
            )));
        }
        Ok(Self {
            renter_id,
            bike_id,
            start_time,
            duration,
        })
    }

    pub(crate) fn from_parts(
        renter_id: i32,
        bike_id: i32,
        start_time: DateTime<Utc>,
        duration: TimeDelta,
    ) -> Self {
        debug_assert!(renter_id > 0 && bike_id > 0 && duration > TimeDelta::zero());
        Self {
            renter_id,
            bike_id,
            start_time,
            duration,
        }
    }

    pub fn renter_id(&self) -> i32 {
        self.renter_id
    }

    pub fn bike_id(&self) -> i32 {
        self.bike_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn duration(&self) -> TimeDelta {
        self.duration
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Renter {
    pub id: i32,
    pub full_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bike {
    pub id: i32,
    pub serial_number: String,
    pub color: Option<String>,
    pub model_id: i32,
}

/// A rental that has been accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalRecord {
    pub id: i32,
    pub renter_id: i32,
    pub bike_id: i32,
    pub start_time: DateTime<Utc>,
    #[serde(with = "crate::codec::timespan")]
    pub duration: TimeDelta,
}

impl RentalRecord {
    pub fn from_event(event: &RentalEvent) -> Self {
        Self {
            id: 0,
            renter_id: event.renter_id(),
            bike_id: event.bike_id(),
            start_time: event.start_time(),
            duration: event.duration(),
        }
    }
}

/// Stored types carry an id the repository assigns on insert.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> i32;
    fn set_id(&mut self, id: i32);
}

impl Entity for Renter {
    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
}

impl Entity for Bike {
    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
}

impl Entity for RentalRecord {
    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
}

/// Where the broker placed a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Owned copy of a record read from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, Default, Clone)]
pub struct ServiceStats {
    pub total_operations: u64,
    pub create_count: u64,
    pub rejected_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn rejects_non_positive_ids_and_durations() {
        assert!(matches!(
            RentalEvent::new(0, 1, start(), TimeDelta::hours(1)),
            Err(AppError::InvalidEvent(_))
        ));
        assert!(matches!(
            RentalEvent::new(1, -3, start(), TimeDelta::hours(1)),
            Err(AppError::InvalidEvent(_))
        ));
        assert!(matches!(
            RentalEvent::new(1, 1, start(), TimeDelta::zero()),
            Err(AppError::InvalidEvent(_))
        ));
    }

    #[test]
    fn record_copies_event_fields() {
        let event = RentalEvent::new(4, 9, start(), TimeDelta::hours(3)).unwrap();
        let record = RentalRecord::from_event(&event);
        assert_eq!(record.renter_id, 4);
        assert_eq!(record.bike_id, 9);
        assert_eq!(record.start_time, start());
        assert_eq!(record.duration, TimeDelta::hours(3));
    }
}
