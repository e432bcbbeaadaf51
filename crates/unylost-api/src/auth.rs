use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;

use unylost_db::{Database, models::NewUser};
use unylost_types::api::{
    Claims, ForgotPasswordRequest, LoginRequest, LoginResponse, LoginUser, RegisterRequest,
    RegisterResponse, ResetPasswordRequest, VerifyEmailRequest, VerifyWhatsappRequest,
};
use unylost_types::models::{Role, UserProfile};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::notify::verification_code;
use crate::state::{AppState, blocking};
use crate::validation::{Checks, non_blank};

const RESET_TOKEN_TTL_MINUTES: i64 = 60;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut checks = Checks::new();
    checks.required("full_name", req.full_name.as_deref(), "Nama lengkap harus diisi");
    checks.email("email", req.email.as_deref(), "Email tidak valid");
    checks.min_len("password", req.password.as_deref(), 6, "Password minimal 6 karakter");
    checks.phone(
        "phone_number",
        req.phone_number.as_deref(),
        "Nomor telepon harus diisi",
        "Format nomor telepon tidak valid",
    );
    checks.finish()?;

    let full_name = req.full_name.unwrap_or_default().trim().to_string();
    let email = req.email.unwrap_or_default().trim().to_lowercase();
    let password = req.password.unwrap_or_default();
    let phone_number = req.phone_number;
    let address = req.address;
    let code = verification_code();

    let token = code.clone();
    let email_for_db = email.clone();
    let user_id = blocking(&state, move |db| {
        if db.get_user_by_email(&email_for_db)?.is_some() {
            return Ok(None);
        }
        let password_hash = hash_password(&password)?;
        let id = db.create_user(&NewUser {
            full_name: &full_name,
            email: &email_for_db,
            password_hash: &password_hash,
            phone_number: phone_number.as_deref(),
            address: address.as_deref(),
            role: Role::User,
            is_verified: false,
            verification_token: Some(&token),
        })?;
        Ok(Some(id))
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("Email already registered".into()))?;

    state.notifier.send_verification_email(&email, &code);
    info!("Registered user {} ({})", user_id, email);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user_id,
            verification_code: state.config.expose_codes.then_some(code),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let (Some(email), Some(password)) = (non_blank(&req.email), req.password.filter(|p| !p.is_empty())) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };
    let email = email.to_lowercase();

    let user = blocking(&state, move |db| {
        let Some(user) = db.get_user_by_email(&email)? else {
            return Ok(None);
        };
        if !verify_password(&password, &user.password) {
            return Ok(None);
        }
        db.touch_last_login(user.id)?;
        Ok(Some(user))
    })
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    let token = create_token(&state.config, user.id, &user.email)?;

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
        user: LoginUser {
            id: user.id,
            role: user.role(),
            full_name: user.full_name,
            email: user.email,
            phone_number: user.phone_number,
        },
    }))
}

/// Confirms the 6-digit code sent at registration.
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(email), Some(code)) = (non_blank(&req.email), non_blank(&req.code)) else {
        return Err(ApiError::bad_request("Email and verification code are required"));
    };
    let email = email.to_lowercase();
    let code = code.to_string();

    let user = blocking(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.is_verified {
        return Ok(Json(json!({ "message": "Email already verified" })));
    }
    if user.verification_token.as_deref() != Some(code.as_str()) {
        return Err(ApiError::bad_request("Invalid verification code"));
    }

    blocking(&state, move |db| db.mark_user_verified(user.id)).await?;
    Ok(Json(json!({ "message": "Email verified successfully" })))
}

pub async fn verify_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let user = blocking(&state, move |db| db.get_user_by_verification_token(&token))
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid verification token"))?;

    blocking(&state, move |db| db.mark_user_verified(user.id)).await?;
    Ok(Json(json!({ "message": "Email verified successfully" })))
}

/// Development stand-in for WhatsApp verification: always succeeds and
/// echoes the generated code.
pub async fn verify_whatsapp(
    State(state): State<AppState>,
    Json(req): Json<VerifyWhatsappRequest>,
) -> ApiResult<impl IntoResponse> {
    let phone = non_blank(&req.phone).ok_or_else(|| ApiError::bad_request("Phone number is required"))?;
    let code = state.notifier.send_whatsapp_code(phone);
    Ok(Json(json!({
        "success": true,
        "message": "Verification code sent via WhatsApp",
        "code": code,
    })))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = non_blank(&req.email)
        .ok_or_else(|| ApiError::bad_request("Email is required"))?
        .to_lowercase();

    let lookup = email.clone();
    let Some(user) = blocking(&state, move |db| db.get_user_by_email(&lookup)).await? else {
        return Ok(Json(json!({ "message": "Unregistered email" })));
    };

    let token = reset_token();
    let digest = token_digest(&token);
    let expires = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    blocking(&state, move |db| db.set_reset_token(user.id, &digest, expires)).await?;

    state.notifier.send_password_reset(&email, &token);

    let mut body = json!({ "message": "Password reset link sent" });
    if state.config.expose_codes {
        body["resetToken"] = json!(token);
    }
    Ok(Json(body))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("New password is required"))?;
    if password.chars().count() < 6 {
        return Err(ApiError::bad_request("Password minimal 6 karakter"));
    }

    let digest = token_digest(&token);
    let reset = blocking(&state, move |db| {
        let Some(user) = db.get_user_by_reset_token(&digest, Utc::now())? else {
            return Ok(false);
        };
        let password_hash = hash_password(&password)?;
        db.reset_password(user.id, &password_hash)?;
        Ok(true)
    })
    .await?;

    if !reset {
        return Err(ApiError::bad_request("Invalid or expired token"));
    }
    Ok(Json(json!({ "message": "Password reset successful" })))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let profile: UserProfile = blocking(&state, move |db| db.get_user_by_id(user.id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?
        .into();
    Ok(Json(json!({ "user": profile })))
}

// -- Helpers --

/// Argon2id hash in PHC string format.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

pub fn create_token(config: &Config, user_id: i64, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + Duration::hours(config.jwt_ttl_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// 32 random bytes, hex encoded.
fn reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Reset tokens are stored only as their SHA-256 digest.
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Seeds the configured administrator when the database has none.
pub fn ensure_default_admin(db: &Database, config: &Config) -> anyhow::Result<()> {
    if db.has_admin()? {
        return Ok(());
    }
    if let Some(user) = db.get_user_by_email(&config.admin_email)? {
        db.update_user_role(user.id, Role::Admin)?;
        info!("Promoted {} to admin", config.admin_email);
        return Ok(());
    }

    let password_hash = hash_password(&config.admin_password)?;
    db.create_user(&NewUser {
        full_name: "Admin UNYLost",
        email: &config.admin_email,
        password_hash: &password_hash,
        phone_number: None,
        address: None,
        role: Role::Admin,
        is_verified: true,
        verification_token: None,
    })?;
    info!("Created default admin {}", config.admin_email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("secret123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("secret123", "not-a-hash"));
    }

    #[test]
    fn test_token_round_trip() {
        let config = Config::for_tests("test-secret", std::env::temp_dir());
        let token = create_token(&config, 42, "a@uny.ac.id").unwrap();
        let claims = decode_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "a@uny.ac.id");
        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn test_reset_token_shape() {
        let token = reset_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, reset_token());
        assert_eq!(token_digest(&token).len(), 64);
        assert_ne!(token_digest(&token), token);
    }

    #[test]
    fn test_default_admin_seeded_once() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::for_tests("test-secret", std::env::temp_dir());
        ensure_default_admin(&db, &config).unwrap();
        ensure_default_admin(&db, &config).unwrap();

        let admin = db.get_user_by_email("admin@unylost.com").unwrap().unwrap();
        assert_eq!(admin.role(), Role::Admin);
        assert!(verify_password("admin123", &admin.password));
        assert_eq!(db.list_users().unwrap().len(), 1);
    }
}
