//! Booking API endpoints, thin wrappers over the scheduler.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{
    AvailabilityQuery, AvailabilityResponse, Booking, CreateBookingRequest, UpdateBookingRequest,
};
use crate::AppState;

use super::auth::AuthContext;
use super::error::ApiError;
use super::validation::validate_interval;

#[derive(Debug, Deserialize)]
pub struct BookingsFilter {
    pub room_id: Option<i64>,
}

/// List all bookings, optionally narrowed to one room.
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<BookingsFilter>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = match filter.room_id {
        Some(room_id) => state.scheduler.get_by_room(room_id).await?,
        None => state.scheduler.get_all().await?,
    };
    Ok(Json(bookings))
}

/// Availability probe: reports whether the interval is free and, when it is
/// not, which bookings occupy it.
pub async fn availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    if let Err(e) = validate_interval(query.datetime_start, query.datetime_end) {
        return Err(ApiError::validation_field("datetime_start", e));
    }

    let availability = state
        .scheduler
        .check_availability(query.room_id, query.datetime_start, query.datetime_end)
        .await?;

    Ok(Json(AvailabilityResponse {
        available: availability.available,
        conflicting_bookings: availability.conflicts,
    }))
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.scheduler.get_by_id(id).await?;
    Ok(Json(booking))
}

/// Book a room. The booking's user defaults to the authenticated caller;
/// `created_by` always is the caller.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    if let Err(e) = validate_interval(request.datetime_start, request.datetime_end) {
        return Err(ApiError::validation_field("datetime_start", e));
    }

    let booking = state
        .scheduler
        .book_room(
            request.user_id.unwrap_or(ctx.user_id),
            request.room_id,
            request.datetime_start,
            request.datetime_end,
            ctx.user_id,
        )
        .await?;

    Ok(Json(booking))
}

/// Update a booking's interval or references. Conflicting with its own
/// prior interval is fine; conflicting with anything else is a 409.
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    let mut booking = state.scheduler.get_by_id(id).await?;

    if let Some(user_id) = request.user_id {
        booking.user_id = user_id;
    }
    if let Some(room_id) = request.room_id {
        booking.room_id = room_id;
    }
    if let Some(start) = request.datetime_start {
        booking.datetime_start = start;
    }
    if let Some(end) = request.datetime_end {
        booking.datetime_end = end;
    }

    if let Err(e) = validate_interval(booking.datetime_start, booking.datetime_end) {
        return Err(ApiError::validation_field("datetime_start", e));
    }

    let updated = state.scheduler.update_booking(&booking).await?;
    Ok(Json(updated))
}

pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.scheduler.delete_booking(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
