//! Database models split into domain-specific modules.

pub mod booking;
pub mod permission;
pub mod room;
pub mod user;

pub use booking::*;
pub use permission::*;
pub use room::*;
pub use user::*;
