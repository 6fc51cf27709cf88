use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// User administration. `create_router` wraps this router in `rbac::require_admin`,
/// which authenticates the caller (401) and then requires the `admin` role (403).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /users
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        // GET/PATCH/DELETE /users/{id}
        // PATCH and DELETE refuse to demote or delete the calling admin.
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
}
