//! sqlite-backed store implementations.
//!
//! Booking writes re-run the overlap range query inside the write
//! transaction and apply the exact in-memory boundary check before the row
//! lands, so two racing requests cannot both insert into the same interval
//! through the check-then-act window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{
    Booking, DbPool, NewBooking, NewRoom, NewUser, Permission, Role, Room, Route, Scope, User,
};
use crate::scheduler::{is_overlapping, BoundaryPolicy, Interval};

use super::{
    BookingStore, PermissionStore, RoleStore, RoomStore, RouteStore, ScopeStore, StoreError,
    UserStore,
};

/// Every live booking for the room whose interval shares any point with the
/// inclusive `[start, end]` window. The in-memory re-check applies the exact
/// boundary semantics the SQL BETWEEN cannot express.
const OVERLAP_RANGE_SQL: &str = "SELECT * FROM bookings
     WHERE room_id = ?1 AND active = 1 AND deleted_at IS NULL
       AND ((?2 BETWEEN datetime_start AND datetime_end)
         OR (?3 BETWEEN datetime_start AND datetime_end)
         OR (datetime_start BETWEEN ?2 AND ?3)
         OR (datetime_end BETWEEN ?2 AND ?3))";

pub struct SqliteBookingStore {
    pool: DbPool,
    policy: BoundaryPolicy,
}

impl SqliteBookingStore {
    pub fn new(pool: DbPool, policy: BoundaryPolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl BookingStore for SqliteBookingStore {
    async fn create(&self, new: NewBooking) -> Result<Booking, StoreError> {
        let mut tx = self.pool.begin().await?;

        let neighbors: Vec<Booking> = sqlx::query_as(OVERLAP_RANGE_SQL)
            .bind(new.room_id)
            .bind(new.datetime_start)
            .bind(new.datetime_end)
            .fetch_all(&mut *tx)
            .await?;
        let intervals: Vec<Interval> = neighbors.iter().map(Booking::interval).collect();
        let candidate = Interval::new(new.datetime_start, new.datetime_end);
        if is_overlapping(candidate, &intervals, self.policy) {
            tracing::warn!(
                room_id = new.room_id,
                conflicts = neighbors.len(),
                "booking insert lost the interval to an earlier write"
            );
            return Err(StoreError::Conflict(neighbors));
        }

        let booking: Booking = sqlx::query_as(
            "INSERT INTO bookings
               (user_id, room_id, datetime_start, datetime_end, created_by, active, created_at)
             VALUES (?, ?, ?, ?, ?, 1, ?)
             RETURNING *",
        )
        .bind(new.user_id)
        .bind(new.room_id)
        .bind(new.datetime_start)
        .bind(new.datetime_end)
        .bind(new.created_by)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn get_all(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(sqlx::query_as("SELECT * FROM bookings ORDER BY datetime_start")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_by_id(&self, booking_id: i64) -> Result<Booking, StoreError> {
        sqlx::query_as("SELECT * FROM bookings WHERE booking_id = ?")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_room(&self, room_id: i64) -> Result<Vec<Booking>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT * FROM bookings
             WHERE room_id = ? AND active = 1 AND deleted_at IS NULL
             ORDER BY datetime_start",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_by_room_and_range(
        &self,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(sqlx::query_as(OVERLAP_RANGE_SQL)
            .bind(room_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update(&self, booking: &Booking) -> Result<Booking, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Same re-check as create, but the booking's own row is allowed to
        // occupy the interval.
        let neighbors: Vec<Booking> = sqlx::query_as(OVERLAP_RANGE_SQL)
            .bind(booking.room_id)
            .bind(booking.datetime_start)
            .bind(booking.datetime_end)
            .fetch_all(&mut *tx)
            .await?;
        let others: Vec<Booking> = neighbors
            .into_iter()
            .filter(|b| b.booking_id != booking.booking_id)
            .collect();
        let intervals: Vec<Interval> = others.iter().map(Booking::interval).collect();
        let candidate = Interval::new(booking.datetime_start, booking.datetime_end);
        if is_overlapping(candidate, &intervals, self.policy) {
            tracing::warn!(
                booking_id = booking.booking_id,
                conflicts = others.len(),
                "booking update lost the interval to an earlier write"
            );
            return Err(StoreError::Conflict(others));
        }

        // `active`, `created_at`, `created_by` and `deleted_at` are never
        // touched here; `active` changes only at deletion.
        let updated: Option<Booking> = sqlx::query_as(
            "UPDATE bookings
             SET user_id = ?, room_id = ?, datetime_start = ?, datetime_end = ?, updated_at = ?
             WHERE booking_id = ? AND active = 1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(booking.user_id)
        .bind(booking.room_id)
        .bind(booking.datetime_start)
        .bind(booking.datetime_end)
        .bind(Utc::now())
        .bind(booking.booking_id)
        .fetch_optional(&mut *tx)
        .await?;
        let updated = updated.ok_or(StoreError::NotFound)?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn soft_delete(&self, booking_id: i64) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE bookings SET active = 0, deleted_at = ?, updated_at = ?
             WHERE booking_id = ? AND active = 1",
        )
        .bind(now)
        .bind(now)
        .bind(booking_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

pub struct SqliteUserStore {
    pool: DbPool,
}

impl SqliteUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_updated(&self, user_id: i64) -> Result<User, StoreError> {
        sqlx::query_as("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        Ok(sqlx::query_as(
            "INSERT INTO users (name, email, telephone, role_id, username, password_hash, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?)
             RETURNING *",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.telephone)
        .bind(new.role_id)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(sqlx::query_as("SELECT * FROM users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_by_id(&self, user_id: i64) -> Result<User, StoreError> {
        sqlx::query_as("SELECT * FROM users WHERE user_id = ? AND active = 1 AND deleted_at IS NULL")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
        sqlx::query_as("SELECT * FROM users WHERE username = ? AND active = 1 AND deleted_at IS NULL")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = ? WHERE user_id = ? AND active = 1",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_updated(user_id).await
    }

    async fn update_username(&self, user_id: i64, username: &str) -> Result<User, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET username = ?, updated_at = ? WHERE user_id = ? AND active = 1",
        )
        .bind(username)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_updated(user_id).await
    }

    async fn update_role(&self, user_id: i64, role_id: i64) -> Result<User, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET role_id = ?, updated_at = ? WHERE user_id = ? AND active = 1",
        )
        .bind(role_id)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_updated(user_id).await
    }

    async fn soft_delete(&self, user_id: i64) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET active = 0, deleted_at = ?, updated_at = ? WHERE user_id = ? AND active = 1",
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

pub struct SqliteRoomStore {
    pool: DbPool,
}

impl SqliteRoomStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomStore for SqliteRoomStore {
    async fn create(&self, new: NewRoom) -> Result<Room, StoreError> {
        Ok(sqlx::query_as(
            "INSERT INTO rooms (number, capacity, created_by, active, created_at)
             VALUES (?, ?, ?, 1, ?)
             RETURNING *",
        )
        .bind(&new.number)
        .bind(new.capacity)
        .bind(new.created_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_all(&self) -> Result<Vec<Room>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT * FROM rooms WHERE active = 1 AND deleted_at IS NULL ORDER BY room_id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_by_id(&self, room_id: i64) -> Result<Room, StoreError> {
        sqlx::query_as("SELECT * FROM rooms WHERE room_id = ? AND active = 1 AND deleted_at IS NULL")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, room: &Room) -> Result<Room, StoreError> {
        let updated: Option<Room> = sqlx::query_as(
            "UPDATE rooms SET number = ?, capacity = ?, updated_at = ?
             WHERE room_id = ? AND active = 1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(&room.number)
        .bind(room.capacity)
        .bind(Utc::now())
        .bind(room.room_id)
        .fetch_optional(&self.pool)
        .await?;
        updated.ok_or(StoreError::NotFound)
    }

    async fn soft_delete(&self, room_id: i64) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE rooms SET active = 0, deleted_at = ?, updated_at = ? WHERE room_id = ? AND active = 1",
        )
        .bind(now)
        .bind(now)
        .bind(room_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

pub struct SqliteRoleStore {
    pool: DbPool,
}

impl SqliteRoleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for SqliteRoleStore {
    async fn get_by_id(&self, role_id: i64) -> Result<Role, StoreError> {
        sqlx::query_as("SELECT * FROM roles WHERE role_id = ? AND active = 1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }
}

pub struct SqliteRouteStore {
    pool: DbPool,
}

impl SqliteRouteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RouteStore for SqliteRouteStore {
    async fn get_by_id(&self, route_id: i64) -> Result<Route, StoreError> {
        sqlx::query_as("SELECT * FROM routes WHERE route_id = ? AND active = 1")
            .bind(route_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_url(&self, url: &str) -> Result<Route, StoreError> {
        sqlx::query_as("SELECT * FROM routes WHERE url = ? AND active = 1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }
}

pub struct SqliteScopeStore {
    pool: DbPool,
}

impl SqliteScopeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopeStore for SqliteScopeStore {
    async fn get_by_id(&self, scope_id: i64) -> Result<Scope, StoreError> {
        sqlx::query_as("SELECT * FROM scopes WHERE scope_id = ? AND active = 1")
            .bind(scope_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }
}

pub struct SqlitePermissionStore {
    pool: DbPool,
}

impl SqlitePermissionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn get_by_role_and_route(
        &self,
        role_id: i64,
        route_id: i64,
    ) -> Result<Vec<Permission>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT * FROM permissions WHERE role_id = ? AND route_id = ? AND deleted_at IS NULL",
        )
        .bind(role_id)
        .bind(route_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
