use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no token: health, the credential exchange endpoints and
/// read-only access to judgment notes.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(handlers::health))
        // POST /auth/register
        // Always creates a `user` account.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        .route("/auth/login", post(handlers::login))
        // POST /auth/logout
        // Stateless; nothing is revoked server-side.
        .route("/auth/logout", post(handlers::logout))
        // GET /judgments?search=...&page=...&limit=...
        .route("/judgments", get(handlers::list_judgments))
        // GET /judgments/{id}
        .route("/judgments/{id}", get(handlers::get_judgment))
}
