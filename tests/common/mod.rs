#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use judgment_notes::{
    AppConfig, AppState,
    auth::TokenCodec,
    create_router,
    error::RepoError,
    models::{
        CreatedJudgment, Judgment, JudgmentPayload, NewUser, Role, User, UserChanges,
        UserCredentials,
    },
    password::hash_password,
    repository::Repository,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

// --- IN-MEMORY REPOSITORY ---

// Behaves like the Postgres store for everything the handlers observe: case-insensitive
// search, listing order, unique emails and sequential document numbers.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    users: Vec<UserCredentials>,
    judgments: Vec<Judgment>,
    doc_seq: u64,
}

fn matches_search(judgment: &Judgment, term: &str) -> bool {
    let needle = term.to_lowercase();
    let hit = |value: &str| value.to_lowercase().contains(&needle);
    hit(&judgment.doc_no)
        || hit(&judgment.title)
        || judgment.case_no.as_deref().is_some_and(hit)
        || judgment.court.as_deref().is_some_and(hit)
        || judgment.notes.as_deref().is_some_and(hit)
}

impl Store {
    fn filtered(&self, search: Option<&str>) -> Vec<Judgment> {
        let term = search.map(str::trim).filter(|t| !t.is_empty());
        let mut items: Vec<Judgment> = self
            .judgments
            .iter()
            .filter(|j| term.is_none_or(|t| matches_search(j, t)))
            .cloned()
            .collect();
        // Option orders None first, so a descending sort leaves undated rows last.
        items.sort_by(|a, b| {
            b.judgment_date
                .cmp(&a.judgment_date)
                .then(b.updated_at.cmp(&a.updated_at))
        });
        items
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|c| c.user.email.eq_ignore_ascii_case(email) && Some(c.user.id) != except)
    }
}

impl InMemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn judgment_count(&self) -> usize {
        self.store.lock().unwrap().judgments.len()
    }

    pub fn user_count(&self) -> usize {
        self.store.lock().unwrap().users.len()
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.store
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|c| c.user.id == id)
            .map(|c| c.user.clone())
    }

    pub fn judgment(&self, id: Uuid) -> Option<Judgment> {
        self.store
            .lock()
            .unwrap()
            .judgments
            .iter()
            .find(|j| j.id == id)
            .cloned()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn count_judgments(&self, search: Option<&str>) -> Result<i64, RepoError> {
        Ok(self.store.lock().unwrap().filtered(search).len() as i64)
    }

    async fn list_judgments(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Judgment>, RepoError> {
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .store
            .lock()
            .unwrap()
            .filtered(search)
            .into_iter()
            .skip(skip)
            .take(take)
            .collect())
    }

    async fn get_judgment(&self, id: Uuid) -> Result<Option<Judgment>, RepoError> {
        Ok(self.judgment(id))
    }

    async fn create_judgment(
        &self,
        payload: &JudgmentPayload,
    ) -> Result<CreatedJudgment, RepoError> {
        let mut store = self.store.lock().unwrap();
        store.doc_seq += 1;
        let now = Utc::now();
        let judgment = Judgment {
            id: Uuid::new_v4(),
            doc_no: format!("JN-{:06}", store.doc_seq),
            title: payload.title.clone(),
            case_no: payload.case_no.clone(),
            court: payload.court.clone(),
            judgment_date: payload.judgment_date,
            parties: payload.parties.clone(),
            facts: payload.facts.clone(),
            issues: payload.issues.clone(),
            holding: payload.holding.clone(),
            notes: payload.notes.clone(),
            tags: payload.tags.clone(),
            created_at: now,
            updated_at: now,
        };
        let created = CreatedJudgment {
            id: judgment.id,
            doc_no: judgment.doc_no.clone(),
        };
        store.judgments.push(judgment);
        Ok(created)
    }

    async fn update_judgment(
        &self,
        id: Uuid,
        payload: &JudgmentPayload,
    ) -> Result<bool, RepoError> {
        let mut store = self.store.lock().unwrap();
        let Some(judgment) = store.judgments.iter_mut().find(|j| j.id == id) else {
            return Ok(false);
        };
        judgment.title = payload.title.clone();
        judgment.case_no = payload.case_no.clone();
        judgment.court = payload.court.clone();
        judgment.judgment_date = payload.judgment_date;
        judgment.parties = payload.parties.clone();
        judgment.facts = payload.facts.clone();
        judgment.issues = payload.issues.clone();
        judgment.holding = payload.holding.clone();
        judgment.notes = payload.notes.clone();
        judgment.tags = payload.tags.clone();
        judgment.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete_judgment(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut store = self.store.lock().unwrap();
        let before = store.judgments.len();
        store.judgments.retain(|j| j.id != id);
        Ok(store.judgments.len() < before)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserCredentials>, RepoError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|c| c.user.email == email)
            .cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.user(id))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        let store = self.store.lock().unwrap();
        let mut users: Vec<User> = store.users.iter().rev().map(|c| c.user.clone()).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut store = self.store.lock().unwrap();
        if store.email_taken(&user.email, None) {
            return Err(RepoError::UniqueViolation("users_email_key".to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            role: user.role,
            avatar_url: None,
            created_at: Utc::now(),
        };
        store.users.push(UserCredentials {
            user: created.clone(),
            password_hash: user.password_hash,
        });
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<bool, RepoError> {
        let mut store = self.store.lock().unwrap();
        if let Some(email) = &changes.email {
            if store.email_taken(email, Some(id)) {
                return Err(RepoError::UniqueViolation("users_email_key".to_string()));
            }
        }
        let Some(credentials) = store.users.iter_mut().find(|c| c.user.id == id) else {
            return Ok(false);
        };
        if let Some(email) = &changes.email {
            credentials.user.email = email.clone();
        }
        if let Some(name) = &changes.name {
            credentials.user.name = name.clone();
        }
        if let Some(role) = changes.role {
            credentials.user.role = role;
        }
        if let Some(hash) = &changes.password_hash {
            credentials.password_hash = hash.clone();
        }
        Ok(true)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut store = self.store.lock().unwrap();
        let before = store.users.len();
        store.users.retain(|c| c.user.id != id);
        Ok(store.users.len() < before)
    }
}

// --- APP HELPERS ---

pub fn test_app(repo: Arc<InMemoryRepository>) -> Router {
    create_router(AppState::new(repo, AppConfig::default()))
}

pub fn codec() -> TokenCodec {
    TokenCodec::new(&AppConfig::default().jwt_secret)
}

pub fn token_for(user: &User) -> String {
    codec().issue(user).unwrap()
}

/// Inserts an account directly, bypassing the API.
pub async fn seed_user(repo: &InMemoryRepository, email: &str, password: &str, role: Role) -> User {
    repo.create_user(NewUser {
        email: email.to_string(),
        name: email.split('@').next().unwrap_or("user").to_string(),
        role,
        password_hash: hash_password(password).unwrap(),
    })
    .await
    .unwrap()
}

pub async fn seed_judgment(repo: &InMemoryRepository, payload: JudgmentPayload) -> CreatedJudgment {
    repo.create_judgment(&payload).await.unwrap()
}

pub fn titled(title: &str) -> JudgmentPayload {
    JudgmentPayload {
        title: title.to_string(),
        ..Default::default()
    }
}

/// Sends one request through the router and returns the status and the JSON body
/// (`Value::Null` when the body is empty).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
