//! User API endpoints. Password and role changes go through the auth
//! service so hashing stays in one place.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::db::{
    UpdatePasswordRequest, UpdateRoleRequest, UpdateUsernameRequest, UserResponse,
};
use crate::AppState;

use super::error::ApiError;
use super::validation::{validate_password, validate_username};

pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.users.get_all().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.get_by_id(id).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Err(e) = validate_password(&request.password) {
        return Err(ApiError::validation_field("password", e));
    }

    let user = state.auth.update_password(id, &request.password).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn update_username(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUsernameRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Err(e) = validate_username(&request.username) {
        return Err(ApiError::validation_field("username", e));
    }

    let user = state.auth.update_username(id, &request.username).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth.update_role(id, request.role_id).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.users.soft_delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
