//! Authentication endpoints and the bearer-token middleware.
//!
//! Identity is the caller's remote address with the port stripped; it is
//! baked into every issued token and re-checked on every request. The
//! middleware validates the access token, then consults the permission
//! lattice with the record reference resolved from the request path or
//! query, and stashes an [`AuthContext`] for the handlers.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, Uri},
    middleware::Next,
    response::Response,
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::{IpIdentity, OwnedResource, TokenPair};
use crate::db::{LoginRequest, NewUser, RefreshRequest, RegisterRequest, UserResponse};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_email, validate_name, validate_password, validate_telephone, validate_username,
};

/// Default role for self-registered users.
const DEFAULT_ROLE_ID: i64 = crate::db::ROLE_USER;

/// What the middleware learned about the caller; available to handlers via
/// request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub role_id: i64,
    pub ip: String,
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get("Authorization")?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(|t| t.to_string())
}

/// Resolve the permission route and the record the request refers to.
///
/// `/bookings/17` checks the `/bookings` route against booking 17; an id may
/// also arrive as a `booking_id`/`room_id`/`user_id` query parameter. A
/// request with no recognizable record gets a route-level check only, which
/// an `owner` scope denies.
fn resolve_resource(uri: &Uri) -> (String, Option<OwnedResource>) {
    let path = uri.path();
    let path = path.strip_prefix("/api").unwrap_or(path);

    let mut segments = path.trim_start_matches('/').split('/');
    let root = segments.next().unwrap_or("");
    let route_url = format!("/{root}");

    let path_id: Option<i64> = segments.next().and_then(|s| s.parse().ok());
    let query_id = |key: &str| -> Option<i64> {
        uri.query()?.split('&').find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            if parts.next()? == key {
                parts.next()?.parse().ok()
            } else {
                None
            }
        })
    };

    let resource = match root {
        "bookings" => path_id.or_else(|| query_id("booking_id")).map(OwnedResource::Booking),
        "rooms" => path_id.or_else(|| query_id("room_id")).map(OwnedResource::Room),
        "users" => path_id.or_else(|| query_id("user_id")).map(OwnedResource::User),
        _ => None,
    };

    (route_url, resource)
}

/// Middleware validating the access token and the caller's permission for
/// the requested route.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = addr.ip().to_string();

    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    let validation = state.auth.validate_access_token(&token, &ip);
    if !validation.is_valid() {
        return Err(ApiError::unauthorized(validation.state.describe()));
    }
    let claims = validation
        .claims
        .as_ref()
        .and_then(|c| c.access())
        .ok_or_else(|| ApiError::unauthorized("Token claims are not access claims"))?;

    let user_id: i64 = claims
        .subject
        .parse()
        .map_err(|_| ApiError::unauthorized("Token subject is not a valid user id"))?;
    let role_id: i64 = claims
        .role
        .parse()
        .map_err(|_| ApiError::unauthorized("Token role is not a valid role id"))?;

    let (route_url, resource) = resolve_resource(request.uri());
    let granted = state
        .auth
        .check_permission(&route_url, resource, user_id, role_id)
        .await?;
    if !granted {
        tracing::warn!(user_id, role_id, route_url = %route_url, "access denied");
        return Err(ApiError::forbidden("Access denied"));
    }

    request.extensions_mut().insert(AuthContext {
        user_id,
        role_id,
        ip,
    });
    Ok(next.run(request).await)
}

/// Login endpoint: verify credentials and issue a token pair bound to the
/// caller's address.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if request.username.is_empty() {
        errors.add("username", "Username is required");
    }
    if request.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.finish()?;

    let user = state
        .auth
        .authenticate(&request.username, &request.password)
        .await?;

    let pair = state.auth.issue_token_pair(
        &user,
        IpIdentity {
            ip: addr.ip().to_string(),
        },
    )?;

    Ok(Json(pair))
}

/// Registration endpoint. The clear password exists only inside this
/// request; everything stored is the salted hash.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&request.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_telephone(&request.telephone) {
        errors.add("telephone", e);
    }
    if let Err(e) = validate_username(&request.username) {
        errors.add("username", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    let profile = NewUser {
        name: request.name,
        email: request.email,
        telephone: request.telephone,
        role_id: request.role_id.unwrap_or(DEFAULT_ROLE_ID),
        username: request.username,
        password_hash: String::new(),
    };

    let user = state.auth.register(profile, &request.password).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Token refresh: bearer access token (expiry tolerated) plus the refresh
/// token in the body buy a fresh pair.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let access_token = bearer_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    if request.refresh_token.is_empty() {
        return Err(ApiError::validation_field(
            "refresh_token",
            "Refresh token is required",
        ));
    }

    let pair = state
        .auth
        .refresh_tokens(&access_token, &request.refresh_token, &addr.ip().to_string())
        .await?;

    Ok(Json(pair))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn resolves_record_from_path() {
        let (route, resource) = resolve_resource(&uri("/bookings/17"));
        assert_eq!(route, "/bookings");
        assert_eq!(resource, Some(OwnedResource::Booking(17)));

        let (route, resource) = resolve_resource(&uri("/rooms/3"));
        assert_eq!(route, "/rooms");
        assert_eq!(resource, Some(OwnedResource::Room(3)));
    }

    #[test]
    fn resolves_record_from_query() {
        let (route, resource) = resolve_resource(&uri("/bookings?booking_id=9"));
        assert_eq!(route, "/bookings");
        assert_eq!(resource, Some(OwnedResource::Booking(9)));
    }

    #[test]
    fn strips_api_prefix() {
        let (route, resource) = resolve_resource(&uri("/api/users/5"));
        assert_eq!(route, "/users");
        assert_eq!(resource, Some(OwnedResource::User(5)));
    }

    #[test]
    fn non_numeric_segment_is_route_level_only() {
        let (route, resource) = resolve_resource(&uri("/bookings/availability?room_id=2"));
        assert_eq!(route, "/bookings");
        // `room_id` belongs to the availability query, not a booking record.
        assert_eq!(resource, None);
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Basic xyz".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
