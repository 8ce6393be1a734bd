use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{request::Parts, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::response::AppError;
use crate::state::AppState;
use crate::store::operations::sessions::AuthSession;

/// 写入 JWT `iss`，校验时只接受本服务签发的令牌
pub const TOKEN_ISSUER: &str = "blink-health";
/// 浏览器端 SSE 无法带 Authorization 头，令牌同时下发为 cookie
pub const TOKEN_COOKIE: &str = "token";

/// 账号不存在时也跑一次 argon2 校验，使登录耗时一致
pub const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$ZHVtbXlzYWx0ZHVtbXk$YWJjZGVmZ2hpamtsbW5vcHFyc3R1dnd4eXoxMjM0NTY";

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(&format!("password hash failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::internal(&format!("stored password hash unreadable: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 会话表只保存令牌的 SHA-256
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// 新签发的访问令牌及其会话记录
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub session: AuthSession,
}

pub fn issue_token(user_id: &str, secret: &str, ttl_hours: u64) -> Result<IssuedToken, AppError> {
    let issued_at = Utc::now();
    let expires_at = issued_at + Duration::hours(ttl_hours as i64);
    let claims = Claims {
        sub: user_id.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        iat: issued_at.timestamp(),
        exp: expires_at.timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(&format!("jwt sign failed: {e}")))?;

    Ok(IssuedToken {
        session: AuthSession::new(user_id, &hash_token(&token), issued_at, expires_at),
        token,
    })
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "JWT rejected");
            AppError::unauthorized("Invalid or expired token")
        })
}

/// 先取 `Authorization: Bearer`，没有时回退到 cookie
pub fn extract_token_from_headers(headers: &HeaderMap) -> Result<String, AppError> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    bearer
        .or_else(|| cookie_value(headers, TOKEN_COOKIE))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

pub fn token_cookie(token: &str, expires_at: DateTime<Utc>) -> String {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    format!("{TOKEN_COOKIE}={token}; Path=/; Max-Age={max_age}; SameSite=Strict; HttpOnly; Secure")
}

pub fn cleared_token_cookie() -> String {
    format!("{TOKEN_COOKIE}=; Path=/; Max-Age=0; SameSite=Strict; HttpOnly; Secure")
}

/// 已登录用户；令牌必须对应一条未过期的会话
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub token_hash: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = extract_token_from_headers(&parts.headers)?;
        let claims = verify_jwt(&token, &app_state.config().jwt_secret)?;

        let token_hash = hash_token(&token);
        let session = app_state
            .store()
            .get_session(&token_hash)?
            .filter(|s| s.user_id == claims.sub)
            .ok_or_else(|| AppError::unauthorized("Session not found or expired"))?;

        if app_state.store().get_user_by_id(&session.user_id)?.is_none() {
            return Err(AppError::unauthorized("User not found"));
        }

        Ok(AuthUser {
            user_id: session.user_id,
            token_hash,
        })
    }
}
