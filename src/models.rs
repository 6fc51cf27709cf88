use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles ---

/// Role
///
/// The closed set of RBAC roles. Parsed once at the boundary (request payloads,
/// token claims, database rows) so the rest of the code never compares strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Case-insensitive, whitespace-trimmed parse. Unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Users ---

/// User
///
/// The public view of an account. The password hash never leaves the repository
/// layer through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserCredentials
///
/// Internal pairing of an account with its stored password hash, used only by login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// UserRow
///
/// Raw `users` row. `role` is stored as text and converted into `Role` on the way out.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub password_hash: Option<String>,
}

impl UserRow {
    /// Converts the row into the public `User`. A role outside the enum means the
    /// table was edited by hand; it is reported rather than guessed.
    pub fn into_user(self) -> Result<User, String> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| format!("user {} has unknown role '{}'", self.id, self.role))?;
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            role,
            avatar_url: self.avatar_url,
            created_at: self.created_at,
        })
    }
}

/// NewUser
///
/// Fully validated insert payload. Email is already normalized and the password hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}

/// UserChanges
///
/// Validated partial update. Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.name.is_none()
            && self.role.is_none()
            && self.password_hash.is_none()
    }
}

// --- Judgment Notes ---

/// Judgment
///
/// A judgment note record from the `judgments` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Judgment {
    pub id: Uuid,
    // Store-assigned, sequential, immutable after insert.
    pub doc_no: String,
    pub title: String,
    pub case_no: Option<String>,
    pub court: Option<String>,
    /// Serialized as `YYYY-MM-DD`.
    #[ts(type = "string | null")]
    pub judgment_date: Option<NaiveDate>,
    pub parties: Option<String>,
    pub facts: Option<String>,
    pub issues: Option<String>,
    pub holding: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// JudgmentPayload
///
/// Input for both create (POST) and full replacement (PUT). Absent optional fields
/// are written as NULL on update; there is no merge with the stored record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct JudgmentPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub case_no: Option<String>,
    pub court: Option<String>,
    #[ts(type = "string | null")]
    pub judgment_date: Option<NaiveDate>,
    pub parties: Option<String>,
    pub facts: Option<String>,
    pub issues: Option<String>,
    pub holding: Option<String>,
    pub notes: Option<String>,
    /// Absent and `null` both mean no tags.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// CreatedJudgment
///
/// Response for POST /judgments: only the new id and the assigned document number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct CreatedJudgment {
    pub id: Uuid,
    pub doc_no: String,
}

/// PaginatedJudgments
///
/// One page of the judgment listing plus the counters the front-end pages with.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PaginatedJudgments {
    pub items: Vec<Judgment>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

// --- Request Payloads ---

/// RegisterRequest
///
/// Input for POST /auth/register. Missing fields deserialize as empty strings so
/// they are reported by validation rather than by the JSON extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// LoginRequest
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// AuthResponse
///
/// Returned by register and login: a bearer token valid for seven days and the
/// account it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// CreateUserRequest
///
/// Admin input for POST /users. `role` defaults to `user` when absent or blank.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub role: Option<String>,
}

/// UpdateUserRequest
///
/// Partial update payload for PATCH /users/{id}. Every field is optional and
/// validated independently when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// HealthResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
}
