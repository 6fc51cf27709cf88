use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, RepoError},
    models::{
        AuthResponse, CreateUserRequest, CreatedJudgment, HealthResponse, Judgment,
        JudgmentPayload, LoginRequest, MessageResponse, NewUser, PaginatedJudgments,
        RegisterRequest, Role, UpdateUserRequest, User, UserChanges,
    },
    password::{hash_password_blocking, validate_password, verify_password_blocking},
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Shared Helpers ---

/// Canonical form of an email address: trimmed and lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Parses a path id. A malformed id cannot match any row, so it is reported as the
/// resource's not-found error.
fn parse_id(raw: &str, not_found: &'static str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::not_found(not_found))
}

fn email_conflict(err: RepoError) -> AppError {
    match err {
        RepoError::UniqueViolation(_) => AppError::Conflict("email already exists".to_string()),
        other => other.into(),
    }
}

// --- Filter Structs ---

/// ListJudgmentsQuery
///
/// Query parameters for GET /judgments. `page` and `limit` are taken as raw strings
/// so unparsable values fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListJudgmentsQuery {
    /// Case-insensitive substring over doc number, title, case number, court and notes.
    pub search: Option<String>,
    /// 1-based page number. Defaults to 1.
    pub page: Option<String>,
    /// Page size. Defaults to 10, capped at 100.
    pub limit: Option<String>,
}

/// Pagination
///
/// Normalized paging window. Always `page >= 1` and `1 <= limit <= MAX_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = match limit {
            Some(l) if l >= 1 => l.min(Self::MAX_LIMIT),
            _ => Self::DEFAULT_LIMIT,
        };
        Self { page, limit }
    }

    /// Lenient parse of the raw query values.
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<i64>().ok());
        Self::new(parse(page), parse(limit))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Number of pages needed for `total` rows; an empty listing still has one page.
    pub fn total_pages(&self, total: i64) -> i64 {
        (total.saturating_add(self.limit - 1) / self.limit).max(1)
    }
}

// --- Health ---

/// health
///
/// [Public Route] Liveness check.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "system"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

// --- Auth ---

/// register
///
/// [Public Route] Creates a `user` account and returns a token for it.
/// The role is never taken from the request; admins are created through the
/// user-administration API or the startup bootstrap.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Missing field or short password"),
        (status = 409, description = "Email already exists")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);
    let name = payload.name.trim().to_string();

    if email.is_empty() || payload.password.is_empty() || name.is_empty() {
        return Err(AppError::validation("email, password, and name are required"));
    }
    validate_password(&payload.password)?;

    let password_hash = hash_password_blocking(payload.password).await?;
    let user = state
        .repo
        .create_user(NewUser {
            email,
            name,
            role: Role::User,
            password_hash,
        })
        .await
        .map_err(email_conflict)?;

    let token = state.tokens.issue(&user)?;
    tracing::info!(user_id = %user.id, "account registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// login
///
/// [Public Route] Exchanges credentials for a token.
/// Unknown email and wrong password produce the same 401 so the response does not
/// reveal which accounts exist.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Missing field"),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }

    let invalid = || AppError::unauthorized("invalid email or password");

    let credentials = match state.repo.find_user_by_email(&email).await {
        Ok(Some(credentials)) => credentials,
        Ok(None) => {
            tracing::warn!(email = %email, "login failed: unknown email");
            return Err(invalid());
        }
        Err(e) => {
            tracing::error!(error = %e, "login failed: user lookup error");
            return Err(invalid());
        }
    };

    if !verify_password_blocking(payload.password, credentials.password_hash).await? {
        tracing::warn!(user_id = %credentials.user.id, "login failed: wrong password");
        return Err(invalid());
    }

    let user = credentials.user;
    let token = state.tokens.issue(&user)?;
    tracing::info!(user_id = %user.id, "login succeeded");

    Ok(Json(AuthResponse { token, user }))
}

/// me
///
/// [Authenticated Route] Returns the caller's current account record.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    state
        .repo
        .get_user(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("user not found"))
}

/// logout
///
/// [Public Route] Tokens are stateless; the client discards its copy.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse)),
    tag = "auth"
)]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "logged out".to_string(),
    })
}

// --- Judgment Notes ---

/// Title is required and stored trimmed.
fn validated_judgment(
    payload: Result<Json<JudgmentPayload>, JsonRejection>,
) -> Result<JudgmentPayload, AppError> {
    let Json(mut payload) = payload?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("invalid payload (title required)"));
    }
    payload.title = title.to_string();
    Ok(payload)
}

/// list_judgments
///
/// [Public Route] One page of judgment notes, optionally filtered by `search`.
#[utoipa::path(
    get,
    path = "/api/judgments",
    params(ListJudgmentsQuery),
    responses((status = 200, description = "Judgment page", body = PaginatedJudgments)),
    tag = "judgments"
)]
pub async fn list_judgments(
    State(state): State<AppState>,
    Query(query): Query<ListJudgmentsQuery>,
) -> Result<Json<PaginatedJudgments>, AppError> {
    let paging = Pagination::from_query(query.page.as_deref(), query.limit.as_deref());
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty());

    let total = state.repo.count_judgments(search).await?;
    let items = state
        .repo
        .list_judgments(search, paging.limit, paging.offset())
        .await?;

    Ok(Json(PaginatedJudgments {
        items,
        total,
        page: paging.page,
        limit: paging.limit,
        total_pages: paging.total_pages(total),
    }))
}

/// get_judgment
///
/// [Public Route] A single judgment note.
#[utoipa::path(
    get,
    path = "/api/judgments/{id}",
    params(("id" = Uuid, Path, description = "Judgment id")),
    responses(
        (status = 200, description = "Judgment", body = Judgment),
        (status = 404, description = "Not found")
    ),
    tag = "judgments"
)]
pub async fn get_judgment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Judgment>, AppError> {
    let id = parse_id(&id, "not found")?;
    state
        .repo
        .get_judgment(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("not found"))
}

/// create_judgment
///
/// [Authenticated Route] Inserts a judgment note. The document number is assigned
/// by the store and returned alongside the new id.
#[utoipa::path(
    post,
    path = "/api/judgments",
    request_body = JudgmentPayload,
    responses(
        (status = 201, description = "Created", body = CreatedJudgment),
        (status = 400, description = "Title missing"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "judgments"
)]
pub async fn create_judgment(
    AuthUser { id: author, .. }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<JudgmentPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedJudgment>), AppError> {
    let payload = validated_judgment(payload)?;
    let created = state.repo.create_judgment(&payload).await?;
    tracing::info!(
        judgment_id = %created.id,
        doc_no = %created.doc_no,
        by = %author,
        "judgment created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_judgment
///
/// [Authenticated Route] Replaces every mutable field of a judgment note.
/// Fields absent from the body are cleared.
#[utoipa::path(
    put,
    path = "/api/judgments/{id}",
    params(("id" = Uuid, Path, description = "Judgment id")),
    request_body = JudgmentPayload,
    responses(
        (status = 204, description = "Updated"),
        (status = 400, description = "Title missing"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = [])),
    tag = "judgments"
)]
pub async fn update_judgment(
    AuthUser { id: author, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<JudgmentPayload>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "not found")?;
    let payload = validated_judgment(payload)?;

    if !state.repo.update_judgment(id, &payload).await? {
        return Err(AppError::not_found("not found"));
    }
    tracing::info!(judgment_id = %id, by = %author, "judgment updated");
    Ok(StatusCode::NO_CONTENT)
}

/// delete_judgment
///
/// [Authenticated Route] Removes a judgment note.
#[utoipa::path(
    delete,
    path = "/api/judgments/{id}",
    params(("id" = Uuid, Path, description = "Judgment id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Not found")
    ),
    security(("bearer" = [])),
    tag = "judgments"
)]
pub async fn delete_judgment(
    AuthUser { id: author, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "not found")?;
    if !state.repo.delete_judgment(id).await? {
        return Err(AppError::not_found("not found"));
    }
    tracing::info!(judgment_id = %id, by = %author, "judgment deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- User Administration ---

/// plan_user_update
///
/// Validates a partial update against the target account and the caller. Returns
/// the changes to write (without the password hash) and the new plaintext password
/// if one was supplied.
pub fn plan_user_update(
    request: UpdateUserRequest,
    target: Uuid,
    caller: Uuid,
) -> Result<(UserChanges, Option<String>), AppError> {
    let mut changes = UserChanges::default();

    if let Some(email) = request.email {
        let email = normalize_email(&email);
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation("invalid email"));
        }
        changes.email = Some(email);
    }

    if let Some(name) = request.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name cannot be empty"));
        }
        changes.name = Some(name.to_string());
    }

    if let Some(role) = request.role {
        let role = Role::parse(&role).ok_or_else(|| AppError::validation("invalid role"))?;
        if target == caller && role != Role::Admin {
            return Err(AppError::validation("cannot downgrade your own role"));
        }
        changes.role = Some(role);
    }

    if let Some(password) = &request.password {
        validate_password(password)?;
    }

    Ok((changes, request.password))
}

/// list_users
///
/// [Admin Route] Every account, newest first.
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Users", body = [User]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.repo.list_users().await?))
}

/// get_user
///
/// [Admin Route] A single account.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let id = parse_id(&id, "user not found")?;
    state
        .repo
        .get_user(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("user not found"))
}

/// create_user
///
/// [Admin Route] Creates an account with an explicit role (default `user`).
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Missing field, short password or unknown role"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Email already exists")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    AuthUser { id: admin, .. }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);
    let name = payload.name.trim().to_string();

    if email.is_empty() || payload.password.is_empty() || name.is_empty() {
        return Err(AppError::validation("email, password, and name are required"));
    }
    validate_password(&payload.password)?;

    let role = match payload.role.as_deref().map(str::trim) {
        None | Some("") => Role::User,
        Some(raw) => Role::parse(raw).ok_or_else(|| AppError::validation("invalid role"))?,
    };

    let password_hash = hash_password_blocking(payload.password).await?;
    let user = state
        .repo
        .create_user(NewUser {
            email,
            name,
            role,
            password_hash,
        })
        .await
        .map_err(email_conflict)?;

    tracing::info!(user_id = %user.id, role = %user.role, by = %admin, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// update_user
///
/// [Admin Route] Partial update. An admin cannot change their own role away from
/// `admin`. An empty body is accepted and changes nothing.
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 204, description = "Updated"),
        (status = 400, description = "Invalid field or self-demotion"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already exists")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_user(
    AuthUser { id: caller, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "user not found")?;
    let Json(payload) = payload?;

    let (mut changes, password) = plan_user_update(payload, id, caller)?;
    if let Some(password) = password {
        changes.password_hash = Some(hash_password_blocking(password).await?);
    }

    if changes.is_empty() {
        return Ok(StatusCode::NO_CONTENT);
    }

    let updated = state
        .repo
        .update_user(id, &changes)
        .await
        .map_err(email_conflict)?;
    if !updated {
        return Err(AppError::not_found("user not found"));
    }

    tracing::info!(user_id = %id, by = %caller, "user updated");
    Ok(StatusCode::NO_CONTENT)
}

/// delete_user
///
/// [Admin Route] Removes an account. Admins cannot delete themselves.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Attempted self-delete"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    AuthUser { id: caller, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "user not found")?;
    if id == caller {
        return Err(AppError::validation("cannot delete your own account"));
    }

    if !state.repo.delete_user(id).await? {
        return Err(AppError::not_found("user not found"));
    }

    tracing::info!(user_id = %id, by = %caller, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_caps() {
        let defaults = Pagination { page: 1, limit: 10 };
        assert_eq!(Pagination::from_query(None, None), defaults);
        assert_eq!(Pagination::from_query(Some("0"), Some("0")), defaults);
        assert_eq!(Pagination::from_query(Some("-4"), Some("-1")), defaults);
        assert_eq!(Pagination::from_query(Some("abc"), Some("x")), defaults);
        assert_eq!(Pagination::from_query(Some("2"), Some("500")).limit, 100);
        assert_eq!(
            Pagination::from_query(Some(" 3 "), Some("25")),
            Pagination { page: 3, limit: 25 }
        );
    }

    #[test]
    fn pagination_offsets_and_page_counts() {
        let p = Pagination::new(Some(3), Some(10));
        assert_eq!(p.offset(), 20);
        assert_eq!(p.total_pages(25), 3);
        assert_eq!(p.total_pages(30), 3);
        assert_eq!(p.total_pages(31), 4);
        assert_eq!(p.total_pages(0), 1);
    }

    #[test]
    fn huge_page_does_not_overflow() {
        let p = Pagination::new(Some(i64::MAX), Some(100));
        assert_eq!(p.offset(), i64::MAX);
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn malformed_ids_are_not_found() {
        assert_eq!(
            parse_id("not-a-uuid", "not found"),
            Err(AppError::not_found("not found"))
        );
    }

    #[test]
    fn plan_rejects_self_demotion() {
        let me = Uuid::new_v4();
        let request = UpdateUserRequest {
            role: Some("user".to_string()),
            ..Default::default()
        };
        assert_eq!(
            plan_user_update(request, me, me).unwrap_err(),
            AppError::validation("cannot downgrade your own role")
        );
    }

    #[test]
    fn plan_allows_demoting_others_and_keeping_own_admin() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        let (changes, _) = plan_user_update(
            UpdateUserRequest {
                role: Some(" USER ".to_string()),
                ..Default::default()
            },
            other,
            me,
        )
        .unwrap();
        assert_eq!(changes.role, Some(Role::User));

        let (changes, _) = plan_user_update(
            UpdateUserRequest {
                role: Some("admin".to_string()),
                ..Default::default()
            },
            me,
            me,
        )
        .unwrap();
        assert_eq!(changes.role, Some(Role::Admin));
    }

    #[test]
    fn plan_validates_each_present_field() {
        let id = Uuid::new_v4();
        let caller = Uuid::new_v4();
        let plan = |request| plan_user_update(request, id, caller);

        let invalid = [
            UpdateUserRequest {
                email: Some("no-at-sign".into()),
                ..Default::default()
            },
            UpdateUserRequest {
                name: Some("   ".into()),
                ..Default::default()
            },
            UpdateUserRequest {
                role: Some("root".into()),
                ..Default::default()
            },
            UpdateUserRequest {
                password: Some("123".into()),
                ..Default::default()
            },
        ];
        for request in invalid {
            assert!(plan(request).is_err());
        }

        let (changes, password) = plan(UpdateUserRequest {
            email: Some(" New@X.com ".into()),
            name: Some(" Nia ".into()),
            password: Some("longenough".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(changes.email.as_deref(), Some("new@x.com"));
        assert_eq!(changes.name.as_deref(), Some("Nia"));
        assert_eq!(password.as_deref(), Some("longenough"));
    }

    #[test]
    fn empty_plan_is_a_no_op() {
        let (changes, password) =
            plan_user_update(UpdateUserRequest::default(), Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert!(changes.is_empty());
        assert!(password.is_none());
    }
}
