use axum::{extract::Request, middleware::Next, response::Response};

use crate::{auth::AuthUser, error::AppError, models::Role};

/// Roles allowed through the admin-only routes.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// authorize
///
/// Role check run after authentication has populated the context.
/// No role on the context is an authentication problem (401); a role that is
/// unknown or outside `allowed` is an authorization problem (403).
pub fn authorize(user: &AuthUser, allowed: &[Role]) -> Result<(), AppError> {
    let claim = user
        .role
        .as_deref()
        .ok_or_else(|| AppError::unauthorized("unauthorized"))?;

    match Role::parse(claim) {
        Some(role) if allowed.contains(&role) => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

/// require_admin
///
/// Route layer for the user-administration router. The `AuthUser` extractor performs
/// authentication (401 on failure) before the role check runs.
pub async fn require_admin(
    user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&user, ADMIN_ONLY)?;
    Ok(next.run(request).await)
}
