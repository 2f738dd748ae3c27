//! In-memory fakes and request plumbing shared by the API tests. The
//! router under test is the real one; only the AWS edges are swapped out.

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use memelytics_api::auth::{PasswordHasher, TokenService};
use memelytics_api::domain::{FileStorage, MemeRepository, UserRepository};
use memelytics_api::errors::{RepoError, StorageError};
use memelytics_api::models::{Meme, NewMeme, NewUser, User};
use memelytics_api::state::AppState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const TEST_BASE_URL: &str = "http://localhost:3000";

// --- Fakes ---

#[derive(Default)]
pub struct InMemoryUserRepository {
    inner: Mutex<UserStore>,
}

#[derive(Default)]
struct UserStore {
    next_id: i64,
    users: Vec<User>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, new_user: NewUser) -> Result<User, RepoError> {
        let mut store = self.inner.lock().unwrap();
        store.next_id += 1;
        let user = new_user.into_user(store.next_id);
        store.users.push(user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let store = self.inner.lock().unwrap();
        Ok(store.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let needle = email.to_lowercase();
        let store = self.inner.lock().unwrap();
        Ok(store
            .users
            .iter()
            .find(|u| u.email.to_lowercase() == needle)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let store = self.inner.lock().unwrap();
        Ok(store.users.iter().find(|u| u.username == username).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError> {
        let needle = username.to_lowercase();
        let store = self.inner.lock().unwrap();
        Ok(store
            .users
            .iter()
            .any(|u| u.username.to_lowercase() == needle))
    }

    async fn list_all(&self) -> Result<Vec<User>, RepoError> {
        Ok(self.inner.lock().unwrap().users.clone())
    }

    async fn update(&self, user: &User) -> Result<(), RepoError> {
        let mut store = self.inner.lock().unwrap();
        if let Some(slot) = store.users.iter_mut().find(|u| u.id == user.id) {
            *slot = user.clone();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMemeRepository {
    inner: Mutex<MemeStore>,
}

#[derive(Default)]
struct MemeStore {
    next_id: i64,
    memes: Vec<Meme>,
    owner_seqs: HashMap<i64, i64>,
}

#[async_trait]
impl MemeRepository for InMemoryMemeRepository {
    async fn insert(&self, new_meme: NewMeme) -> Result<Meme, RepoError> {
        let mut store = self.inner.lock().unwrap();
        store.next_id += 1;
        let meme = new_meme.into_meme(store.next_id, Utc::now());
        store.memes.push(meme.clone());
        Ok(meme)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Meme>, RepoError> {
        let store = self.inner.lock().unwrap();
        Ok(store.memes.iter().find(|m| m.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Meme>, RepoError> {
        Ok(self.inner.lock().unwrap().memes.clone())
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Meme>, RepoError> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .memes
            .iter()
            .filter(|m| m.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn next_owner_seq(&self, owner_id: i64) -> Result<i64, RepoError> {
        let mut store = self.inner.lock().unwrap();
        let seq = store.owner_seqs.entry(owner_id).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }
}

#[derive(Default)]
pub struct InMemoryFileStorage {
    objects: Mutex<HashMap<String, (Vec<u8>, Option<String>)>>,
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type));
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<(Vec<u8>, Option<String>), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

/// Application state wired to the fakes, with fixed test secrets.
pub fn test_state() -> Arc<AppState> {
    Arc::new(AppState {
        user_repo: Arc::new(InMemoryUserRepository::default()),
        meme_repo: Arc::new(InMemoryMemeRepository::default()),
        file_storage: Arc::new(InMemoryFileStorage::default()),
        password_hasher: PasswordHasher::new("test_salt".to_string()),
        token_service: TokenService::new("test-secret".to_string(), Duration::days(7)),
        public_base_url: TEST_BASE_URL.to_string(),
    })
}

// --- Request helpers ---

/// Drives one request through the router and decodes the JSON body. An
/// empty body decodes as Null.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Like `send`, but keeps the body raw. For the stored-file routes.
pub async fn send_bytes(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, bytes.to_vec())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_authed(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn put_json_authed(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_multipart_authed(uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

// --- Multipart body construction ---

pub const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

#[derive(Default)]
pub struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}
