//! Storage seams consumed by the scheduler and the authentication service.
//!
//! Every trait here has a sqlite-backed implementation in [`sqlite`]; the
//! traits exist so the decision cores can be exercised against in-memory
//! fakes in tests.

mod sqlite;

pub use sqlite::{
    SqliteBookingStore, SqlitePermissionStore, SqliteRoleStore, SqliteRoomStore,
    SqliteRouteStore, SqliteScopeStore, SqliteUserStore,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::{Booking, NewBooking, NewRoom, NewUser, Permission, Role, Room, Route, Scope, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no matching row")]
    NotFound,
    /// The write transaction re-ran the range check and found the interval
    /// taken. Carries the rows that occupy it.
    #[error("interval conflicts with {} existing booking(s)", .0.len())]
    Conflict(Vec<Booking>),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a booking. The implementation re-checks the interval inside
    /// the same transaction as the insert and fails with
    /// [`StoreError::Conflict`] if it is taken, closing the check-then-act
    /// window between availability check and creation.
    async fn create(&self, new: NewBooking) -> Result<Booking, StoreError>;
    async fn get_all(&self) -> Result<Vec<Booking>, StoreError>;
    async fn get_by_id(&self, booking_id: i64) -> Result<Booking, StoreError>;
    async fn get_by_room(&self, room_id: i64) -> Result<Vec<Booking>, StoreError>;
    /// Every live booking for the room whose interval shares any point with
    /// `[start, end]`, per the inclusive BETWEEN predicate. Exact boundary
    /// semantics are applied in memory by the overlap engine.
    async fn get_by_room_and_range(
        &self,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError>;
    /// Update interval and references of a live booking. Same transactional
    /// re-check as `create`, except the booking's own row is not a conflict.
    async fn update(&self, booking: &Booking) -> Result<Booking, StoreError>;
    /// Soft delete: `active = false`, `deleted_at = now`. Fails with
    /// [`StoreError::NotFound`] when no live row matched.
    async fn soft_delete(&self, booking_id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn get_all(&self) -> Result<Vec<User>, StoreError>;
    async fn get_by_id(&self, user_id: i64) -> Result<User, StoreError>;
    async fn get_by_username(&self, username: &str) -> Result<User, StoreError>;
    async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<User, StoreError>;
    async fn update_username(&self, user_id: i64, username: &str) -> Result<User, StoreError>;
    async fn update_role(&self, user_id: i64, role_id: i64) -> Result<User, StoreError>;
    async fn soft_delete(&self, user_id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create(&self, new: NewRoom) -> Result<Room, StoreError>;
    async fn get_all(&self) -> Result<Vec<Room>, StoreError>;
    async fn get_by_id(&self, room_id: i64) -> Result<Room, StoreError>;
    async fn update(&self, room: &Room) -> Result<Room, StoreError>;
    async fn soft_delete(&self, room_id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get_by_id(&self, role_id: i64) -> Result<Role, StoreError>;
}

#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn get_by_id(&self, route_id: i64) -> Result<Route, StoreError>;
    async fn get_by_url(&self, url: &str) -> Result<Route, StoreError>;
}

#[async_trait]
pub trait ScopeStore: Send + Sync {
    async fn get_by_id(&self, scope_id: i64) -> Result<Scope, StoreError>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_by_role_and_route(
        &self,
        role_id: i64,
        route_id: i64,
    ) -> Result<Vec<Permission>, StoreError>;
}
