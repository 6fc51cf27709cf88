use crate::{
    error::RepoError,
    models::{
        CreatedJudgment, Judgment, JudgmentPayload, NewUser, User, UserChanges, UserCredentials,
        UserRow,
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only ever talk to
/// `Arc<dyn Repository>`, so tests can swap the Postgres implementation for an
/// in-memory one.
///
/// Mutations report "no row matched" as `Ok(false)`; only genuine store failures are
/// errors.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Judgment Notes ---
    // Number of rows matching the optional search term, ignoring pagination.
    async fn count_judgments(&self, search: Option<&str>) -> Result<i64, RepoError>;
    // One page of matching rows, newest judgment date first.
    async fn list_judgments(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Judgment>, RepoError>;
    async fn get_judgment(&self, id: Uuid) -> Result<Option<Judgment>, RepoError>;
    // The store assigns the document number.
    async fn create_judgment(
        &self,
        payload: &JudgmentPayload,
    ) -> Result<CreatedJudgment, RepoError>;
    // Full replacement of every mutable column; refreshes updated_at.
    async fn update_judgment(
        &self,
        id: Uuid,
        payload: &JudgmentPayload,
    ) -> Result<bool, RepoError>;
    async fn delete_judgment(&self, id: Uuid) -> Result<bool, RepoError>;

    // --- Users ---
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserCredentials>, RepoError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    // Newest accounts first.
    async fn list_users(&self) -> Result<Vec<User>, RepoError>;
    // Fails with `RepoError::UniqueViolation` on a duplicate email.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    // Writes only the `Some` fields of `changes`.
    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<bool, RepoError>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Columns the listing search matches against (OR-combined, case-insensitive).
const SEARCH_COLUMNS: [&str; 5] = ["doc_no", "title", "case_no", "court", "notes"];

const JUDGMENT_COLUMNS: &str = "id, doc_no, title, case_no, court, judgment_date, \
     parties, facts, issues, holding, notes, tags, created_at, updated_at";

const USER_COLUMNS: &str = "id, email, name, role, avatar_url, created_at";

/// PostgresRepository
///
/// The concrete implementation of `Repository`, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escapes LIKE metacharacters so the search term matches as a plain substring.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// push_search_filter
///
/// Appends `WHERE (col ILIKE $n OR ...)` for a non-empty term. Every column gets its
/// own bound parameter; nothing user-supplied is spliced into the SQL text.
fn push_search_filter(builder: &mut QueryBuilder<'_, Postgres>, search: Option<&str>) {
    let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) else {
        return;
    };
    let pattern = like_pattern(term);

    builder.push(" WHERE (");
    {
        let mut any = builder.separated(" OR ");
        for column in SEARCH_COLUMNS {
            any.push(format!("{column} ILIKE "));
            any.push_bind_unseparated(pattern.clone());
        }
    }
    builder.push(")");
}

fn user_from_row(row: UserRow) -> Result<User, RepoError> {
    row.into_user().map_err(RepoError::Database)
}

#[async_trait]
impl Repository for PostgresRepository {
    /// count_judgments
    ///
    /// Total matches for the listing, irrespective of pagination.
    async fn count_judgments(&self, search: Option<&str>) -> Result<i64, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM judgments");
        push_search_filter(&mut builder, search);

        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// list_judgments
    ///
    /// Ordered by judgment date (NULLs last), then by most recent update.
    async fn list_judgments(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Judgment>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(JUDGMENT_COLUMNS);
        builder.push(" FROM judgments");
        push_search_filter(&mut builder, search);
        builder.push(" ORDER BY judgment_date DESC NULLS LAST, updated_at DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let items = builder
            .build_query_as::<Judgment>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn get_judgment(&self, id: Uuid) -> Result<Option<Judgment>, RepoError> {
        let judgment = sqlx::query_as::<_, Judgment>(&format!(
            "SELECT {JUDGMENT_COLUMNS} FROM judgments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(judgment)
    }

    /// create_judgment
    ///
    /// `next_judgment_doc_no()` draws from a sequence inside the INSERT, so concurrent
    /// creates never share a document number.
    async fn create_judgment(
        &self,
        payload: &JudgmentPayload,
    ) -> Result<CreatedJudgment, RepoError> {
        let created = sqlx::query_as::<_, CreatedJudgment>(
            r#"
            INSERT INTO judgments
                (doc_no, title, case_no, court, judgment_date,
                 parties, facts, issues, holding, notes, tags)
            VALUES
                (next_judgment_doc_no(), $1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, doc_no
            "#,
        )
        .bind(&payload.title)
        .bind(&payload.case_no)
        .bind(&payload.court)
        .bind(payload.judgment_date)
        .bind(&payload.parties)
        .bind(&payload.facts)
        .bind(&payload.issues)
        .bind(&payload.holding)
        .bind(&payload.notes)
        .bind(&payload.tags)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_judgment(
        &self,
        id: Uuid,
        payload: &JudgmentPayload,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE judgments
            SET title = $1, case_no = $2, court = $3, judgment_date = $4, parties = $5,
                facts = $6, issues = $7, holding = $8, notes = $9, tags = $10,
                updated_at = NOW()
            WHERE id = $11
            "#,
        )
        .bind(&payload.title)
        .bind(&payload.case_no)
        .bind(&payload.court)
        .bind(payload.judgment_date)
        .bind(&payload.parties)
        .bind(&payload.facts)
        .bind(&payload.issues)
        .bind(&payload.holding)
        .bind(&payload.notes)
        .bind(&payload.tags)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_judgment(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM judgments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// find_user_by_email
    ///
    /// The only query that reads `password_hash`. Emails are stored normalized, so the
    /// caller passes an already lowercased value.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserCredentials>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|mut row| {
            let password_hash = row.password_hash.take().unwrap_or_default();
            user_from_row(row).map(|user| UserCredentials {
                user,
                password_hash,
            })
        })
        .transpose()
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(user_from_row).collect()
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, password_hash, name, role) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        user_from_row(row)
    }

    /// update_user
    ///
    /// Builds `UPDATE users SET a = $1, b = $2 ... WHERE id = $n` from the fields that are
    /// present. An empty change set touches nothing and reports whether the row exists.
    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<bool, RepoError> {
        if changes.is_empty() {
            return Ok(self.get_user(id).await?.is_some());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        {
            let mut sets = builder.separated(", ");
            if let Some(email) = &changes.email {
                sets.push("email = ");
                sets.push_bind_unseparated(email.clone());
            }
            if let Some(name) = &changes.name {
                sets.push("name = ");
                sets.push_bind_unseparated(name.clone());
            }
            if let Some(role) = changes.role {
                sets.push("role = ");
                sets.push_bind_unseparated(role.as_str());
            }
            if let Some(hash) = &changes.password_hash {
                sets.push("password_hash = ");
                sets.push_bind_unseparated(hash.clone());
            }
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
