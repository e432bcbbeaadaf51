mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "UNYLost API is running");
}

#[tokio::test]
async fn test_register_login_me() {
    let app = TestApp::new().await;
    let (id, token) = app.user("budi@uny.ac.id").await;

    let (status, body) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id);
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["is_verified"], false);
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "full_name": "", "email": "nope", "password": "123", "phone_number": "12345" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let paths: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, ["full_name", "email", "password", "phone_number"]);

    app.user("dup@uny.ac.id").await;
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "full_name": "Again",
                "email": "DUP@uny.ac.id",
                "password": "secret123",
                "phone_number": "+6281234567890",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already registered");
}

#[tokio::test]
async fn test_login_failures() {
    let app = TestApp::new().await;
    app.user("siti@uny.ac.id").await;

    let (status, _) = app.post("/api/auth/login", None, json!({ "email": "siti@uny.ac.id" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "email": "siti@uny.ac.id", "password": "wrong-pass" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_auth_middleware_errors() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token, authorization denied");

    let (status, body) = app.get("/api/auth/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token is not valid");

    let (_, token) = app.user("gone@uny.ac.id").await;
    let forged = unylost_api::auth::create_token(&app.state.config, 9999, "ghost@uny.ac.id").unwrap();
    let (status, body) = app.get("/api/auth/me", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User not found");

    let (status, body) = app.get("/api/admin/users", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied. Admin role required.");
}

#[tokio::test]
async fn test_verify_email_with_code() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({
                "full_name": "Andi",
                "email": "andi@uny.ac.id",
                "password": "secret123",
                "phone_number": "081298765432",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let code = body["verificationCode"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);

    let (status, _) = app
        .post("/api/auth/verify-email", None, json!({ "email": "andi@uny.ac.id", "code": "000000x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/auth/verify-email", None, json!({ "email": "nobody@uny.ac.id", "code": code }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post("/api/auth/verify-email", None, json!({ "email": "andi@uny.ac.id", "code": code }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email verified successfully");

    let (status, body) = app.get(&format!("/api/auth/verify/{}", code), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid verification token");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new().await;
    app.user("rina@uny.ac.id").await;

    let (status, body) = app
        .post("/api/auth/forgot-password", None, json!({ "email": "unknown@uny.ac.id" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Unregistered email");

    let (status, body) = app
        .post("/api/auth/forgot-password", None, json!({ "email": "rina@uny.ac.id" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["resetToken"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);

    let (status, _) = app
        .post(&format!("/api/auth/reset-password/{}", token), None, json!({ "password": "123" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(&format!("/api/auth/reset-password/{}", token), None, json!({ "password": "newpass99" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    app.login("rina@uny.ac.id", "newpass99").await;

    let (status, body) = app
        .post(&format!("/api/auth/reset-password/{}", token), None, json!({ "password": "another99" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_verify_whatsapp_stub() {
    let app = TestApp::new().await;

    let (status, body) = app.post("/api/auth/verify-whatsapp", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Phone number is required");

    let (status, body) = app
        .post("/api/auth/verify-whatsapp", None, json!({ "phone": "081234567890" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["code"].as_str().unwrap().len(), 6);
}
