//! Input validation for API requests.
//!
//! This module provides validation functions for API request data,
//! ensuring all inputs meet the required format and constraints.
//!
//! For collecting multiple validation errors and returning them as an ApiError,
//! use the `ValidationErrorBuilder` from the `error` module.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating email addresses (pragmatic, not RFC-complete)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)+$"
    ).unwrap();

    /// Regex for validating telephone numbers (digits, optional leading +,
    /// separators)
    static ref TELEPHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9][0-9 ()-]{4,30}$"
    ).unwrap();

    /// Regex for validating usernames (alphanumeric with ._-, 3-32 chars)
    static ref USERNAME_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9][a-zA-Z0-9._-]{2,31}$"
    ).unwrap();
}

/// Validate a username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username must be 3-32 characters, alphanumeric with dots, dashes or underscores"
                .to_string(),
        );
    }

    Ok(())
}

/// Validate a password. Only presence and length are enforced here; the
/// hash is never inspected.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 || !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate a telephone number (optional field; empty is accepted)
pub fn validate_telephone(telephone: &str) -> Result<(), String> {
    if telephone.is_empty() {
        return Ok(());
    }

    if !TELEPHONE_REGEX.is_match(telephone) {
        return Err("Invalid telephone number".to_string());
    }

    Ok(())
}

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Validate a room number/label
pub fn validate_room_number(number: &str) -> Result<(), String> {
    if number.is_empty() {
        return Err("Room number is required".to_string());
    }

    if number.len() > 32 {
        return Err("Room number is too long (max 32 characters)".to_string());
    }

    Ok(())
}

/// Validate a room capacity
pub fn validate_capacity(capacity: i64) -> Result<(), String> {
    if capacity < 1 {
        return Err("Capacity must be at least 1".to_string());
    }

    if capacity > 10_000 {
        return Err("Capacity is implausibly large".to_string());
    }

    Ok(())
}

/// Validate a booking interval: start must be strictly before end. The
/// overlap engine never sees an inverted or empty interval.
pub fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), String> {
    if start >= end {
        return Err("datetime_start must be before datetime_end".to_string());
    }

    Ok(())
}
