//! Booking scheduler: availability checks, creation, update, soft deletion.
//!
//! The scheduler is the decision layer between the HTTP handlers and the
//! booking store. It owns no mutable state; every operation re-reads the
//! store and applies the overlap engine to the returned rows.

pub mod overlap;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::{Booking, NewBooking};
use crate::store::{BookingStore, StoreError};

pub use overlap::{is_overlapping, overlaps, BoundaryPolicy, Interval};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("booking interval is invalid: start must be before end")]
    InvalidInterval,
    #[error("room {room_id} is not available in the requested interval")]
    RoomUnavailable {
        room_id: i64,
        conflicts: Vec<Booking>,
    },
    #[error("cannot update booking {booking_id}: overlapping bookings exist")]
    OverlappingBookings {
        booking_id: i64,
        conflicts: Vec<Booking>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of an availability check. On conflict the set is returned for
/// diagnostic payloads.
#[derive(Debug, Clone)]
pub struct Availability {
    pub available: bool,
    pub conflicts: Vec<Booking>,
}

pub struct BookingScheduler {
    store: Arc<dyn BookingStore>,
    policy: BoundaryPolicy,
}

impl BookingScheduler {
    pub fn new(store: Arc<dyn BookingStore>, policy: BoundaryPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn get_all(&self) -> Result<Vec<Booking>, SchedulerError> {
        Ok(self.store.get_all().await?)
    }

    pub async fn get_by_id(&self, booking_id: i64) -> Result<Booking, SchedulerError> {
        Ok(self.store.get_by_id(booking_id).await?)
    }

    pub async fn get_by_room(&self, room_id: i64) -> Result<Vec<Booking>, SchedulerError> {
        Ok(self.store.get_by_room(room_id).await?)
    }

    /// Raw rows from the store's bracketing range query, boundary semantics
    /// not yet applied.
    pub async fn get_overlapping(
        &self,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, SchedulerError> {
        Ok(self.store.get_by_room_and_range(room_id, start, end).await?)
    }

    /// Available iff the candidate interval does not overlap any row the
    /// store's bracketing range query returns.
    pub async fn check_availability(
        &self,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Availability, SchedulerError> {
        if start >= end {
            return Err(SchedulerError::InvalidInterval);
        }

        let neighbors = self.get_overlapping(room_id, start, end).await?;
        let intervals: Vec<Interval> = neighbors.iter().map(Booking::interval).collect();
        let candidate = Interval::new(start, end);

        if is_overlapping(candidate, &intervals, self.policy) {
            Ok(Availability {
                available: false,
                conflicts: neighbors,
            })
        } else {
            Ok(Availability {
                available: true,
                conflicts: Vec::new(),
            })
        }
    }

    pub async fn book_room(
        &self,
        user_id: i64,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        created_by: i64,
    ) -> Result<Booking, SchedulerError> {
        let availability = self.check_availability(room_id, start, end).await?;
        if !availability.available {
            tracing::warn!(
                room_id,
                conflicts = availability.conflicts.len(),
                "room is not available in the requested interval"
            );
            return Err(SchedulerError::RoomUnavailable {
                room_id,
                conflicts: availability.conflicts,
            });
        }

        let created = self
            .store
            .create(NewBooking {
                user_id,
                room_id,
                datetime_start: start,
                datetime_end: end,
                created_by,
            })
            .await
            .map_err(|err| match err {
                // Lost the race between our check and the insert.
                StoreError::Conflict(conflicts) => {
                    SchedulerError::RoomUnavailable { room_id, conflicts }
                }
                other => SchedulerError::Store(other),
            })?;

        tracing::info!(booking_id = created.booking_id, room_id, "booked room");
        Ok(created)
    }

    /// Re-checks availability for the booking's new interval. A booking
    /// whose only conflict is its own prior self may still be updated.
    pub async fn update_booking(&self, booking: &Booking) -> Result<Booking, SchedulerError> {
        if booking.datetime_start >= booking.datetime_end {
            return Err(SchedulerError::InvalidInterval);
        }

        let availability = self
            .check_availability(booking.room_id, booking.datetime_start, booking.datetime_end)
            .await?;

        let only_conflict_is_self = availability.conflicts.len() == 1
            && availability.conflicts[0].booking_id == booking.booking_id;

        if !availability.available && !only_conflict_is_self {
            tracing::warn!(
                booking_id = booking.booking_id,
                conflicts = availability.conflicts.len(),
                "cannot update booking over an occupied interval"
            );
            return Err(SchedulerError::OverlappingBookings {
                booking_id: booking.booking_id,
                conflicts: availability.conflicts,
            });
        }

        let updated = self.store.update(booking).await.map_err(|err| match err {
            StoreError::Conflict(conflicts) => SchedulerError::OverlappingBookings {
                booking_id: booking.booking_id,
                conflicts,
            },
            other => SchedulerError::Store(other),
        })?;

        tracing::info!(booking_id = updated.booking_id, "updated booking");
        Ok(updated)
    }

    pub async fn delete_booking(&self, booking_id: i64) -> Result<(), SchedulerError> {
        self.store.soft_delete(booking_id).await?;
        tracing::info!(booking_id, "soft-deleted booking");
        Ok(())
    }
}
