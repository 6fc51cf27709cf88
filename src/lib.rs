use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod rbac;
pub mod repository;

// Routers grouped by access level (public, authenticated, admin).
pub mod routes;
use auth::{AuthUser, TokenCodec};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{PostgresRepository, RepositoryState};

/// Registers the bearer-token scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` type into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        handlers::health,
        handlers::register, handlers::login, handlers::me, handlers::logout,
        handlers::list_judgments, handlers::get_judgment, handlers::create_judgment,
        handlers::update_judgment, handlers::delete_judgment,
        handlers::list_users, handlers::get_user, handlers::create_user,
        handlers::update_user, handlers::delete_user
    ),
    components(
        schemas(
            models::Role, models::User, models::Judgment, models::JudgmentPayload,
            models::CreatedJudgment, models::PaginatedJudgments, models::RegisterRequest,
            models::LoginRequest, models::AuthResponse, models::MessageResponse,
            models::CreateUserRequest, models::UpdateUserRequest, models::HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and session identity"),
        (name = "judgments", description = "Judgment notes"),
        (name = "users", description = "User administration (admin only)"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, immutable per-process state: the persistence layer, the loaded
/// configuration and the token codec built from its secret.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub tokens: TokenCodec,
}

impl AppState {
    /// Builds the state, deriving the token codec from `config.jwt_secret`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let tokens = TokenCodec::new(&config.jwt_secret);
        Self {
            repo,
            config,
            tokens,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for TokenCodec {
    fn from_ref(app_state: &AppState) -> TokenCodec {
        app_state.tokens.clone()
    }
}

/// auth_middleware
///
/// Route layer for the authenticated router. Extracting `AuthUser` runs the bearer
/// token check; a failure rejects with 401 before the handler is reached.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// preflight_no_content
///
/// `CorsLayer` answers preflight requests with 200; clients of this API expect 204.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// create_router
///
/// Assembles every route under `/api`, applies the access-level layers and the
/// global observability, content-type and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS: every origin, method and header.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API surface. Routes sharing a path across routers keep their own layers.
    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(admin::admin_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            rbac::require_admin,
        )));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .with_state(state);

    // 3. Observability and correlation layers.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json; charset=utf-8"),
                )),
        )
        // 4. CORS, then the preflight status rewrite around it.
        .layer(cors)
        .layer(middleware::from_fn(preflight_no_content))
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the request id, so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
