//! Router Module Index
//!
//! Routes are grouped by the access level they require. The grouping is enforced
//! with route layers in `create_router`, so a handler cannot end up on the wrong
//! side of the authentication or role check by accident.

/// Routes open to anonymous clients.
pub mod public;

/// Routes behind the bearer-token check.
pub mod authenticated;

/// Routes behind the bearer-token check and the `admin` role.
pub mod admin;
