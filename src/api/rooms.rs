//! Room API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::db::{CreateRoomRequest, NewRoom, Room, UpdateRoomRequest};
use crate::AppState;

use super::auth::AuthContext;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_capacity, validate_room_number};

pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Room>>, ApiError> {
    Ok(Json(state.rooms.get_all().await?))
}

pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Room>, ApiError> {
    let room = state.rooms.get_by_id(id).await?;
    Ok(Json(room))
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<Room>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_room_number(&request.number) {
        errors.add("number", e);
    }
    if let Err(e) = validate_capacity(request.capacity) {
        errors.add("capacity", e);
    }
    errors.finish()?;

    let room = state
        .rooms
        .create(NewRoom {
            number: request.number,
            capacity: request.capacity,
            created_by: ctx.user_id,
        })
        .await?;

    Ok(Json(room))
}

pub async fn update_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRoomRequest>,
) -> Result<Json<Room>, ApiError> {
    let mut room = state.rooms.get_by_id(id).await?;

    if let Some(number) = request.number {
        if let Err(e) = validate_room_number(&number) {
            return Err(ApiError::validation_field("number", e));
        }
        room.number = number;
    }
    if let Some(capacity) = request.capacity {
        if let Err(e) = validate_capacity(capacity) {
            return Err(ApiError::validation_field("capacity", e));
        }
        room.capacity = capacity;
    }

    let updated = state.rooms.update(&room).await?;
    Ok(Json(updated))
}

pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.rooms.soft_delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
