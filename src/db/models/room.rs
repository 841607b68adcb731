use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub room_id: i64,
    pub number: String,
    pub capacity: i64,
    pub created_by: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub number: String,
    pub capacity: i64,
    pub created_by: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub number: String,
    pub capacity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoomRequest {
    pub number: Option<String>,
    pub capacity: Option<i64>,
}
