use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use unylost_db::models::UserRow;
use unylost_types::{api::Claims, models::Role};

use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// The authenticated caller, with the role as currently stored.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may modify a record.
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.id == owner_id || self.is_admin()
    }
}

impl From<UserRow> for CurrentUser {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            role: row.role(),
            full_name: row.full_name,
            email: row.email,
        }
    }
}

pub fn decode_token(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
}

/// Validates the JWT from the Authorization header (with or without the
/// `Bearer ` prefix) and attaches the caller's current user record.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("No token, authorization denied".into()))?;

    let claims = decode_token(&state.config.jwt_secret, &token)
        .map_err(|_| ApiError::Unauthorized("Token is not valid".into()))?;

    let user = blocking(&state, move |db| db.get_user_by_id(claims.sub))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    req.extensions_mut().insert(CurrentUser::from(user));
    Ok(next.run(req).await)
}

/// Must be layered inside `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    match req.extensions().get::<CurrentUser>() {
        Some(user) if user.is_admin() => Ok(next.run(req).await),
        Some(_) => Err(ApiError::forbidden("Access denied. Admin role required.")),
        None => Err(ApiError::Unauthorized("No token, authorization denied".into())),
    }
}
