use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes for any caller holding a valid bearer token, regardless of role.
/// `create_router` wraps this router in the authentication route layer; the handlers
/// still take `AuthUser` for the caller's identity, which the layer has already
/// cached on the request.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::me))
        // POST /judgments
        // The store assigns the document number.
        .route("/judgments", post(handlers::create_judgment))
        // PUT/DELETE /judgments/{id}
        // PUT is a full replacement of the mutable fields.
        .route(
            "/judgments/{id}",
            put(handlers::update_judgment).delete(handlers::delete_judgment),
        )
}
