#![allow(dead_code)]

use std::path::PathBuf;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use unylost_api::auth::ensure_default_admin;
use unylost_api::config::Config;
use unylost_api::state::{AppState, AppStateInner};
use unylost_api::storage::Storage;
use unylost_db::Database;

pub const SECRET: &str = "test-secret";
pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub upload_dir: PathBuf,
}

impl TestApp {
    /// Fresh in-memory database with the default admin seeded. The AI Layer
    /// URL points at a closed port, so every upstream call fails.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Same as [`TestApp::new`] but talking to an AI Layer at `ai_layer_url`.
    pub async fn with_ai_layer(ai_layer_url: &str) -> Self {
        Self::build(Some(ai_layer_url)).await
    }

    async fn build(ai_layer_url: Option<&str>) -> Self {
        let upload_dir = std::env::temp_dir().join(format!("unylost-test-{}", uuid::Uuid::new_v4()));
        let mut config = Config::for_tests(SECRET, upload_dir.clone());
        if let Some(url) = ai_layer_url {
            config.ai_layer_url = url.to_string();
        }
        let db = Database::open_in_memory().unwrap();
        ensure_default_admin(&db, &config).unwrap();
        let storage = Storage::new(upload_dir.clone()).await.unwrap();
        let state = AppStateInner::new(db, config, storage).unwrap();
        Self {
            router: unylost_api::router(state.clone()),
            state,
            upload_dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call("PUT", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call("DELETE", uri, token, None).await
    }

    /// `parts` are (name, file name, bytes); a `None` file name makes a text part.
    pub async fn multipart(
        &self,
        uri: &str,
        token: &str,
        parts: &[(&str, Option<&str>, &[u8])],
    ) -> (StatusCode, Value) {
        let boundary = "unylost-test-boundary";
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match file_name {
                Some(file_name) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                }
                None => {
                    body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                }
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post("/api/auth/login", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login("admin@unylost.com", "admin123").await
    }

    /// Registers and logs in a regular user, returning (id, token).
    pub async fn user(&self, email: &str) -> (i64, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "full_name": "Test User",
                    "email": email,
                    "password": "secret123",
                    "phone_number": "081234567890",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        let id = body["userId"].as_i64().unwrap();
        (id, self.login(email, "secret123").await)
    }

    pub async fn category(&self, admin: &str, name: &str) -> i64 {
        let (status, body) = self
            .post("/api/categories", Some(admin), json!({ "name": name, "priority": 1 }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "category failed: {}", body);
        body["category"]["id"].as_i64().unwrap()
    }

    pub async fn found_item(&self, token: &str, category_id: i64, name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/found-items",
                Some(token),
                json!({
                    "item_name": name,
                    "category_id": category_id,
                    "location": "Perpustakaan",
                    "found_date": "2024-03-01",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "found item failed: {}", body);
        body["item"]["id"].as_i64().unwrap()
    }
}
