//! Authentication and authorization service.
//!
//! Issues and refreshes access/refresh token pairs bound to the caller's
//! network identity, verifies credentials against salted password hashes,
//! and answers permission questions over the (role, route, scope) lattice
//! with ownership checks delegated to the stores.

pub mod token;
pub mod validator;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::db::{NewUser, User};
use crate::store::{
    BookingStore, PermissionStore, RoleStore, RoomStore, RouteStore, ScopeStore, StoreError,
    UserStore,
};

pub use token::{AccessClaims, IpIdentity, JoseHeader, RefreshClaims, TokenError};
pub use validator::{validate_token, Claims, TokenKind, TokenValidation, ValidationState};

pub const SCOPE_ALL: &str = "all";
pub const SCOPE_OWNER: &str = "owner";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,
    #[error("wrong credentials")]
    WrongCredentials,
    #[error("token rejected: {}", .0.describe())]
    TokenRejected(ValidationState),
    #[error("refresh token is expired")]
    RefreshTokenExpired,
    #[error("access and refresh tokens are assigned to different users")]
    SubjectMismatch,
    #[error("token subject is not a valid user id: '{0}'")]
    BadSubject(String),
    #[error("no permission for this route")]
    NoPermission,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// An access/refresh pair as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    #[serde(rename = "token")]
    pub access_token: String,
    pub refresh_token: String,
}

/// A record an `owner`-scoped permission can be checked against. Resolved
/// once at the HTTP boundary; the core never re-parses record types from
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedResource {
    Room(i64),
    User(i64),
    Booking(i64),
}

/// Store handles the service consults.
#[derive(Clone)]
pub struct AuthStores {
    pub users: Arc<dyn UserStore>,
    pub rooms: Arc<dyn RoomStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub roles: Arc<dyn RoleStore>,
    pub routes: Arc<dyn RouteStore>,
    pub scopes: Arc<dyn ScopeStore>,
    pub permissions: Arc<dyn PermissionStore>,
}

pub struct AuthService {
    config: AuthConfig,
    stores: AuthStores,
}

impl AuthService {
    pub fn new(config: AuthConfig, stores: AuthStores) -> Self {
        Self { config, stores }
    }

    /// `hex(SHA256(password_bytes ++ salt_bytes))` with the process-wide
    /// fixed salt. Stored hashes are compared case-insensitively.
    pub fn hash_password(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hasher.update(self.config.password_salt.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Identification then authentication: look the user up by username and
    /// compare salted hashes.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .stores
            .users
            .get_by_username(username)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => {
                    tracing::warn!(username, "login attempt for unknown user");
                    AuthError::UserNotFound
                }
                other => AuthError::Store(other),
            })?;

        let supplied = self.hash_password(password);
        if !supplied.eq_ignore_ascii_case(&user.password_hash) {
            tracing::warn!(username, "wrong password");
            return Err(AuthError::WrongCredentials);
        }

        Ok(user)
    }

    /// Hash the password and create the user.
    pub async fn register(&self, profile: NewUser, password: &str) -> Result<User, AuthError> {
        let user = self
            .stores
            .users
            .create(NewUser {
                password_hash: self.hash_password(password),
                ..profile
            })
            .await?;
        tracing::info!(user_id = user.user_id, "registered user");
        Ok(user)
    }

    pub async fn update_password(&self, user_id: i64, password: &str) -> Result<User, AuthError> {
        let hash = self.hash_password(password);
        Ok(self.stores.users.update_password_hash(user_id, &hash).await?)
    }

    pub async fn update_username(&self, user_id: i64, username: &str) -> Result<User, AuthError> {
        Ok(self.stores.users.update_username(user_id, username).await?)
    }

    pub async fn update_role(&self, user_id: i64, role_id: i64) -> Result<User, AuthError> {
        Ok(self.stores.users.update_role(user_id, role_id).await?)
    }

    /// Issue a fresh access/refresh pair bound to `identity`. Both token
    /// lifetimes are stamped from a single `now` read.
    pub fn issue_token_pair(
        &self,
        user: &User,
        identity: IpIdentity,
    ) -> Result<TokenPair, AuthError> {
        let header = JoseHeader::hs256();
        let now = Utc::now();

        let access_claims = AccessClaims {
            issuer: self.config.issuer.clone(),
            issued_at: now.timestamp(),
            expires_at: (now + Duration::seconds(self.config.access_token_ttl_secs)).timestamp(),
            subject: user.user_id.to_string(),
            role: user.role_id.to_string(),
            origin: identity.clone(),
        };
        let refresh_claims = RefreshClaims {
            issuer: self.config.issuer.clone(),
            issued_at: now.timestamp(),
            expires_at: (now + Duration::seconds(self.config.refresh_token_ttl_secs)).timestamp(),
            subject: user.user_id.to_string(),
            origin: identity,
        };

        let access_token = token::encode(&header, &access_claims, &self.config.access_token_key)?;
        let refresh_token =
            token::encode(&header, &refresh_claims, &self.config.refresh_token_key)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn validate_access_token(&self, token: &str, caller_ip: &str) -> TokenValidation {
        validate_token(
            token,
            &self.config.access_token_key,
            TokenKind::Access,
            caller_ip,
            Utc::now(),
        )
    }

    pub fn validate_refresh_token(&self, token: &str, caller_ip: &str) -> TokenValidation {
        validate_token(
            token,
            &self.config.refresh_token_key,
            TokenKind::Refresh,
            caller_ip,
            Utc::now(),
        )
    }

    /// Exchange a (possibly expired) access token plus a fully valid refresh
    /// token for a fresh pair. Both tokens must belong to the same subject
    /// and to the caller's network identity.
    pub async fn refresh_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        caller_ip: &str,
    ) -> Result<TokenPair, AuthError> {
        let access = self.validate_access_token(access_token, caller_ip);
        // Expiry of the access token is exactly what refresh is for; any
        // other defect is fatal.
        if !matches!(access.state, ValidationState::Valid | ValidationState::Expired) {
            return Err(AuthError::TokenRejected(access.state));
        }

        let refresh = self.validate_refresh_token(refresh_token, caller_ip);
        if refresh.state == ValidationState::Expired {
            return Err(AuthError::RefreshTokenExpired);
        }
        if refresh.state != ValidationState::Valid {
            return Err(AuthError::TokenRejected(refresh.state));
        }

        let (Some(access_claims), Some(refresh_claims)) = (access.claims, refresh.claims) else {
            return Err(AuthError::TokenRejected(ValidationState::Malformed));
        };

        if access_claims.subject() != refresh_claims.subject() {
            tracing::warn!(
                access_subject = access_claims.subject(),
                refresh_subject = refresh_claims.subject(),
                "refresh attempted with tokens assigned to different users"
            );
            return Err(AuthError::SubjectMismatch);
        }

        let user_id: i64 = refresh_claims
            .subject()
            .parse()
            .map_err(|_| AuthError::BadSubject(refresh_claims.subject().to_string()))?;

        let user = self
            .stores
            .users
            .get_by_id(user_id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => AuthError::UserNotFound,
                other => AuthError::Store(other),
            })?;

        self.issue_token_pair(
            &user,
            IpIdentity {
                ip: caller_ip.to_string(),
            },
        )
    }

    /// Decide whether `user_id` with `role_id` may act on `route_url`.
    ///
    /// Resolves the route, fetches the (role, route) permissions, and walks
    /// them: an `all` scope grants immediately, an `owner` scope grants only
    /// when the caller owns the referenced record. No matching grant means
    /// access is denied (`Ok(false)`); an empty permission set is the
    /// [`AuthError::NoPermission`] error.
    pub async fn check_permission(
        &self,
        route_url: &str,
        resource: Option<OwnedResource>,
        user_id: i64,
        role_id: i64,
    ) -> Result<bool, AuthError> {
        let role = self
            .stores
            .roles
            .get_by_id(role_id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => {
                    tracing::warn!(role_id, "permission check for unknown role");
                    AuthError::NoPermission
                }
                other => AuthError::Store(other),
            })?;

        let route = self
            .stores
            .routes
            .get_by_url(route_url)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => {
                    tracing::warn!(route_url, "permission check for unknown route");
                    AuthError::NoPermission
                }
                other => AuthError::Store(other),
            })?;

        let permissions = self
            .stores
            .permissions
            .get_by_role_and_route(role.role_id, route.route_id)
            .await?;
        if permissions.is_empty() {
            tracing::warn!(role_id, route_id = route.route_id, "no permissions configured");
            return Err(AuthError::NoPermission);
        }

        for permission in permissions.iter().filter(|p| p.active) {
            let scope = self.stores.scopes.get_by_id(permission.scope_id).await?;
            match scope.name.as_str() {
                SCOPE_ALL => return Ok(true),
                SCOPE_OWNER => {
                    if let Some(resource) = resource {
                        if self.owns(resource, user_id).await? {
                            return Ok(true);
                        }
                    }
                }
                other => {
                    tracing::warn!(scope = other, "unknown scope name, granting nothing");
                }
            }
        }

        Ok(false)
    }

    /// Ownership dispatch by typed resource. A missing record owns nothing.
    async fn owns(&self, resource: OwnedResource, user_id: i64) -> Result<bool, AuthError> {
        match resource {
            OwnedResource::User(id) => Ok(id == user_id),
            OwnedResource::Room(id) => match self.stores.rooms.get_by_id(id).await {
                Ok(room) => Ok(room.created_by == user_id),
                Err(StoreError::NotFound) => Ok(false),
                Err(other) => Err(AuthError::Store(other)),
            },
            OwnedResource::Booking(id) => match self.stores.bookings.get_by_id(id).await {
                Ok(booking) => Ok(booking.created_by == user_id),
                Err(StoreError::NotFound) => Ok(false),
                Err(other) => Err(AuthError::Store(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Booking, NewBooking, NewRoom, Permission, Role, Room, Route, Scope};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use std::sync::Mutex;

    fn test_config() -> AuthConfig {
        AuthConfig {
            issuer: "reserva".to_string(),
            access_token_key: "access-key-for-tests".to_string(),
            refresh_token_key: "refresh-key-for-tests".to_string(),
            password_salt: "fixed-salt".to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_secs: 10800,
            admin_username: String::new(),
            admin_password: String::new(),
        }
    }

    // ── in-memory stores ──────────────────────────────────────────────

    #[derive(Default)]
    struct MemUserStore {
        rows: Mutex<Vec<User>>,
    }

    #[async_trait]
    impl UserStore for MemUserStore {
        async fn create(&self, new: NewUser) -> Result<User, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let user = User {
                user_id: rows.len() as i64 + 1,
                name: new.name,
                email: new.email,
                telephone: new.telephone,
                role_id: new.role_id,
                username: new.username,
                password_hash: new.password_hash,
                active: true,
                created_at: Utc::now(),
                updated_at: None,
                deleted_at: None,
            };
            rows.push(user.clone());
            Ok(user)
        }

        async fn get_all(&self) -> Result<Vec<User>, StoreError> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn get_by_id(&self, user_id: i64) -> Result<User, StoreError> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.user_id == user_id && u.active)
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        async fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.username == username && u.active)
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        async fn update_password_hash(
            &self,
            user_id: i64,
            password_hash: &str,
        ) -> Result<User, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let user = rows
                .iter_mut()
                .find(|u| u.user_id == user_id)
                .ok_or(StoreError::NotFound)?;
            user.password_hash = password_hash.to_string();
            Ok(user.clone())
        }

        async fn update_username(&self, user_id: i64, username: &str) -> Result<User, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let user = rows
                .iter_mut()
                .find(|u| u.user_id == user_id)
                .ok_or(StoreError::NotFound)?;
            user.username = username.to_string();
            Ok(user.clone())
        }

        async fn update_role(&self, user_id: i64, role_id: i64) -> Result<User, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let user = rows
                .iter_mut()
                .find(|u| u.user_id == user_id)
                .ok_or(StoreError::NotFound)?;
            user.role_id = role_id;
            Ok(user.clone())
        }

        async fn soft_delete(&self, user_id: i64) -> Result<(), StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let user = rows
                .iter_mut()
                .find(|u| u.user_id == user_id && u.active)
                .ok_or(StoreError::NotFound)?;
            user.active = false;
            user.deleted_at = Some(Utc::now());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemRoomStore {
        rows: Mutex<Vec<Room>>,
    }

    #[async_trait]
    impl RoomStore for MemRoomStore {
        async fn create(&self, new: NewRoom) -> Result<Room, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let room = Room {
                room_id: rows.len() as i64 + 1,
                number: new.number,
                capacity: new.capacity,
                created_by: new.created_by,
                active: true,
                created_at: Utc::now(),
                updated_at: None,
                deleted_at: None,
            };
            rows.push(room.clone());
            Ok(room)
        }

        async fn get_all(&self) -> Result<Vec<Room>, StoreError> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn get_by_id(&self, room_id: i64) -> Result<Room, StoreError> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.room_id == room_id && r.active)
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        async fn update(&self, room: &Room) -> Result<Room, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| r.room_id == room.room_id && r.active)
                .ok_or(StoreError::NotFound)?;
            row.number = room.number.clone();
            row.capacity = room.capacity;
            Ok(row.clone())
        }

        async fn soft_delete(&self, room_id: i64) -> Result<(), StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| r.room_id == room_id && r.active)
                .ok_or(StoreError::NotFound)?;
            row.active = false;
            row.deleted_at = Some(Utc::now());
            Ok(())
        }
    }

    /// Booking store stub: `check_permission` only reads by id.
    #[derive(Default)]
    struct MemBookingStore {
        rows: Mutex<Vec<Booking>>,
    }

    #[async_trait]
    impl BookingStore for MemBookingStore {
        async fn create(&self, new: NewBooking) -> Result<Booking, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let booking = Booking {
                booking_id: rows.len() as i64 + 1,
                user_id: new.user_id,
                room_id: new.room_id,
                datetime_start: new.datetime_start,
                datetime_end: new.datetime_end,
                created_by: new.created_by,
                active: true,
                created_at: Utc::now(),
                updated_at: None,
                deleted_at: None,
            };
            rows.push(booking.clone());
            Ok(booking)
        }

        async fn get_all(&self) -> Result<Vec<Booking>, StoreError> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn get_by_id(&self, booking_id: i64) -> Result<Booking, StoreError> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.booking_id == booking_id)
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        async fn get_by_room(&self, _room_id: i64) -> Result<Vec<Booking>, StoreError> {
            Ok(Vec::new())
        }

        async fn get_by_room_and_range(
            &self,
            _room_id: i64,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Booking>, StoreError> {
            Ok(Vec::new())
        }

        async fn update(&self, _booking: &Booking) -> Result<Booking, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn soft_delete(&self, _booking_id: i64) -> Result<(), StoreError> {
            Err(StoreError::NotFound)
        }
    }

    struct MemRoleStore {
        rows: Vec<Role>,
    }

    #[async_trait]
    impl RoleStore for MemRoleStore {
        async fn get_by_id(&self, role_id: i64) -> Result<Role, StoreError> {
            self.rows
                .iter()
                .find(|r| r.role_id == role_id)
                .cloned()
                .ok_or(StoreError::NotFound)
        }
    }

    struct MemRouteStore {
        rows: Vec<Route>,
    }

    #[async_trait]
    impl RouteStore for MemRouteStore {
        async fn get_by_id(&self, route_id: i64) -> Result<Route, StoreError> {
            self.rows
                .iter()
                .find(|r| r.route_id == route_id)
                .cloned()
                .ok_or(StoreError::NotFound)
        }

        async fn get_by_url(&self, url: &str) -> Result<Route, StoreError> {
            self.rows
                .iter()
                .find(|r| r.url == url)
                .cloned()
                .ok_or(StoreError::NotFound)
        }
    }

    struct MemScopeStore {
        rows: Vec<Scope>,
    }

    #[async_trait]
    impl ScopeStore for MemScopeStore {
        async fn get_by_id(&self, scope_id: i64) -> Result<Scope, StoreError> {
            self.rows
                .iter()
                .find(|s| s.scope_id == scope_id)
                .cloned()
                .ok_or(StoreError::NotFound)
        }
    }

    struct MemPermissionStore {
        rows: Vec<Permission>,
    }

    #[async_trait]
    impl PermissionStore for MemPermissionStore {
        async fn get_by_role_and_route(
            &self,
            role_id: i64,
            route_id: i64,
        ) -> Result<Vec<Permission>, StoreError> {
            Ok(self
                .rows
                .iter()
                .filter(|p| p.role_id == role_id && p.route_id == route_id)
                .cloned()
                .collect())
        }
    }

    // ── fixture ───────────────────────────────────────────────────────

    const ROUTE_BOOKINGS: i64 = 1;
    const ROUTE_ROOMS: i64 = 2;
    const SCOPE_ALL_ID: i64 = 1;
    const SCOPE_OWNER_ID: i64 = 2;
    const ROLE_ADMIN: i64 = 1;
    const ROLE_USER: i64 = 2;

    fn role(role_id: i64, name: &str) -> Role {
        Role {
            role_id,
            name: name.to_string(),
            description: String::new(),
            active: true,
            created_by: 0,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn route(route_id: i64, url: &str) -> Route {
        Route {
            route_id,
            url: url.to_string(),
            description: String::new(),
            active: true,
            created_by: 0,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn scope(scope_id: i64, name: &str) -> Scope {
        Scope {
            scope_id,
            name: name.to_string(),
            description: String::new(),
            active: true,
            created_by: 0,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn permission(role_id: i64, route_id: i64, scope_id: i64) -> Permission {
        Permission {
            role_id,
            route_id,
            scope_id,
            active: true,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn service() -> AuthService {
        let stores = AuthStores {
            users: Arc::new(MemUserStore::default()),
            rooms: Arc::new(MemRoomStore::default()),
            bookings: Arc::new(MemBookingStore::default()),
            roles: Arc::new(MemRoleStore {
                rows: vec![role(ROLE_ADMIN, "admin"), role(ROLE_USER, "user")],
            }),
            routes: Arc::new(MemRouteStore {
                rows: vec![route(ROUTE_BOOKINGS, "/bookings"), route(ROUTE_ROOMS, "/rooms")],
            }),
            scopes: Arc::new(MemScopeStore {
                rows: vec![scope(SCOPE_ALL_ID, "all"), scope(SCOPE_OWNER_ID, "owner")],
            }),
            permissions: Arc::new(MemPermissionStore {
                rows: vec![
                    permission(ROLE_ADMIN, ROUTE_BOOKINGS, SCOPE_ALL_ID),
                    permission(ROLE_ADMIN, ROUTE_ROOMS, SCOPE_ALL_ID),
                    permission(ROLE_USER, ROUTE_BOOKINGS, SCOPE_OWNER_ID),
                ],
            }),
        };
        AuthService::new(test_config(), stores)
    }

    fn new_user(username: &str, role_id: i64) -> NewUser {
        NewUser {
            name: "Test User".to_string(),
            email: format!("{username}@example.com"),
            telephone: "+100000000".to_string(),
            role_id,
            username: username.to_string(),
            password_hash: String::new(),
        }
    }

    // ── password hashing ──────────────────────────────────────────────

    #[test]
    fn same_password_and_salt_always_hash_identically() {
        let service = service();
        let a = service.hash_password("correct horse battery staple");
        let b = service.hash_password("correct horse battery staple");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_passwords_hash_differently() {
        let service = service();
        assert_ne!(service.hash_password("alpha"), service.hash_password("beta"));
    }

    #[test]
    fn hash_comparison_is_case_insensitive() {
        let service = service();
        let hash = service.hash_password("secret").to_uppercase();
        assert!(service.hash_password("secret").eq_ignore_ascii_case(&hash));
    }

    // ── credentials ───────────────────────────────────────────────────

    #[tokio::test]
    async fn authenticate_round_trip() {
        let service = service();
        service
            .register(new_user("ada", ROLE_USER), "hunter2!")
            .await
            .unwrap();

        let user = service.authenticate("ada", "hunter2!").await.unwrap();
        assert_eq!(user.username, "ada");

        let err = service.authenticate("ada", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::WrongCredentials));

        let err = service.authenticate("nobody", "hunter2!").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn registration_never_stores_the_clear_password() {
        let service = service();
        let user = service
            .register(new_user("ada", ROLE_USER), "hunter2!")
            .await
            .unwrap();
        assert_ne!(user.password_hash, "hunter2!");
        assert_eq!(user.password_hash, service.hash_password("hunter2!"));
    }

    // ── token issuance & refresh ──────────────────────────────────────

    #[tokio::test]
    async fn issued_pair_validates_for_the_issuing_identity() {
        let service = service();
        let user = service
            .register(new_user("ada", ROLE_USER), "hunter2!")
            .await
            .unwrap();

        let pair = service
            .issue_token_pair(&user, IpIdentity { ip: "10.1.2.3".to_string() })
            .unwrap();

        let access = service.validate_access_token(&pair.access_token, "10.1.2.3");
        assert!(access.is_valid());
        let claims = access.claims.unwrap();
        assert_eq!(claims.subject(), user.user_id.to_string());
        assert_eq!(claims.access().unwrap().role, user.role_id.to_string());

        let refresh = service.validate_refresh_token(&pair.refresh_token, "10.1.2.3");
        assert!(refresh.is_valid());

        // Replay from another origin is rejected.
        let replayed = service.validate_access_token(&pair.access_token, "172.16.0.9");
        assert_eq!(replayed.state, ValidationState::IdentityMismatch);
    }

    #[tokio::test]
    async fn refresh_issues_a_new_pair_for_the_same_subject() {
        let service = service();
        let user = service
            .register(new_user("ada", ROLE_USER), "hunter2!")
            .await
            .unwrap();
        let pair = service
            .issue_token_pair(&user, IpIdentity { ip: "10.1.2.3".to_string() })
            .unwrap();

        let fresh = service
            .refresh_tokens(&pair.access_token, &pair.refresh_token, "10.1.2.3")
            .await
            .unwrap();
        let access = service.validate_access_token(&fresh.access_token, "10.1.2.3");
        assert!(access.is_valid());
        assert_eq!(access.claims.unwrap().subject(), user.user_id.to_string());
    }

    #[tokio::test]
    async fn refresh_with_mismatched_subjects_is_rejected() {
        let service = service();
        let ada = service
            .register(new_user("ada", ROLE_USER), "pw-a")
            .await
            .unwrap();
        let bob = service
            .register(new_user("bob", ROLE_USER), "pw-b")
            .await
            .unwrap();
        let identity = IpIdentity { ip: "10.1.2.3".to_string() };
        let ada_pair = service.issue_token_pair(&ada, identity.clone()).unwrap();
        let bob_pair = service.issue_token_pair(&bob, identity).unwrap();

        let err = service
            .refresh_tokens(&ada_pair.access_token, &bob_pair.refresh_token, "10.1.2.3")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SubjectMismatch));
    }

    #[tokio::test]
    async fn refresh_from_another_origin_is_rejected() {
        let service = service();
        let user = service
            .register(new_user("ada", ROLE_USER), "hunter2!")
            .await
            .unwrap();
        let pair = service
            .issue_token_pair(&user, IpIdentity { ip: "10.1.2.3".to_string() })
            .unwrap();

        let err = service
            .refresh_tokens(&pair.access_token, &pair.refresh_token, "172.16.0.9")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::TokenRejected(ValidationState::IdentityMismatch)
        ));
    }

    // ── permissions ───────────────────────────────────────────────────

    #[tokio::test]
    async fn owner_scope_grants_only_on_owned_records() {
        let service = service();
        let ada = service
            .register(new_user("ada", ROLE_USER), "pw-a")
            .await
            .unwrap();
        let bob = service
            .register(new_user("bob", ROLE_USER), "pw-b")
            .await
            .unwrap();

        let ada_booking = service
            .stores
            .bookings
            .create(NewBooking {
                user_id: ada.user_id,
                room_id: 1,
                datetime_start: Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap(),
                datetime_end: Utc.with_ymd_and_hms(2025, 3, 10, 11, 0, 0).unwrap(),
                created_by: ada.user_id,
            })
            .await
            .unwrap();

        // Owner asks about their own booking.
        let granted = service
            .check_permission(
                "/bookings",
                Some(OwnedResource::Booking(ada_booking.booking_id)),
                ada.user_id,
                ROLE_USER,
            )
            .await
            .unwrap();
        assert!(granted);

        // A different user with only owner scope is denied.
        let granted = service
            .check_permission(
                "/bookings",
                Some(OwnedResource::Booking(ada_booking.booking_id)),
                bob.user_id,
                ROLE_USER,
            )
            .await
            .unwrap();
        assert!(!granted);

        // The admin role carries the `all` scope and is granted regardless.
        let granted = service
            .check_permission(
                "/bookings",
                Some(OwnedResource::Booking(ada_booking.booking_id)),
                bob.user_id,
                ROLE_ADMIN,
            )
            .await
            .unwrap();
        assert!(granted);
    }

    #[tokio::test]
    async fn missing_permission_set_is_an_error() {
        let service = service();
        // ROLE_USER has no permission rows for /rooms.
        let err = service
            .check_permission("/rooms", None, 1, ROLE_USER)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NoPermission));
    }

    #[tokio::test]
    async fn owner_scope_without_a_resource_denies() {
        let service = service();
        let ada = service
            .register(new_user("ada", ROLE_USER), "pw-a")
            .await
            .unwrap();
        let granted = service
            .check_permission("/bookings", None, ada.user_id, ROLE_USER)
            .await
            .unwrap();
        assert!(!granted);
    }

    #[tokio::test]
    async fn user_records_are_owned_by_themselves() {
        let service = service();
        assert!(service.owns(OwnedResource::User(7), 7).await.unwrap());
        assert!(!service.owns(OwnedResource::User(7), 8).await.unwrap());
    }
}
