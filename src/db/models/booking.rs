//! Booking model and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::scheduler::Interval;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub booking_id: i64,
    pub user_id: i64,
    pub room_id: i64,
    pub datetime_start: DateTime<Utc>,
    pub datetime_end: DateTime<Utc>,
    pub created_by: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn interval(&self) -> Interval {
        Interval::new(self.datetime_start, self.datetime_end)
    }
}

/// Fields the caller supplies at creation; id, flags and timestamps are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub room_id: i64,
    pub datetime_start: DateTime<Utc>,
    pub datetime_end: DateTime<Utc>,
    pub created_by: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Defaults to the authenticated caller.
    pub user_id: Option<i64>,
    pub room_id: i64,
    pub datetime_start: DateTime<Utc>,
    pub datetime_end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub user_id: Option<i64>,
    pub room_id: Option<i64>,
    pub datetime_start: Option<DateTime<Utc>>,
    pub datetime_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub room_id: i64,
    pub datetime_start: DateTime<Utc>,
    pub datetime_end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub conflicting_bookings: Vec<Booking>,
}
