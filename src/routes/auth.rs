use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{
    cleared_token_cookie, hash_password, issue_token, token_cookie, verify_password, AuthUser,
    IssuedToken, DUMMY_PASSWORD_HASH,
};
use crate::constants::MAX_AUTH_SESSIONS_PER_USER;
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::users::User;
use crate::store::StoreError;
use crate::validation::{normalize_email, normalize_username, validate_password};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(value: &User) -> Self {
        Self {
            id: value.id.clone(),
            email: value.email.clone(),
            username: value.username.clone(),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserProfile,
}

/// 签发令牌并落库会话；同一用户的会话数超过上限时淘汰最旧的
fn issue_access_token(user_id: &str, state: &AppState) -> Result<IssuedToken, AppError> {
    let config = state.config();
    let issued = issue_token(user_id, &config.jwt_secret, config.jwt_expires_in_hours)?;
    state.store().create_session(&issued.session)?;

    match state
        .store()
        .evict_oldest_user_sessions(user_id, MAX_AUTH_SESSIONS_PER_USER)
    {
        Ok(0) => {}
        Ok(evicted) => tracing::info!(user_id, evicted, "Evicted oldest login sessions"),
        Err(e) => tracing::warn!(user_id, error = %e, "Failed to evict old login sessions"),
    }
    Ok(issued)
}

/// 令牌同时放在响应体和 cookie 中
fn auth_response(status: StatusCode, user: &User, issued: IssuedToken) -> Result<Response, AppError> {
    let cookie = token_cookie(&issued.token, issued.session.expires_at);
    let body = AuthResponse {
        access_token: issued.token,
        user: UserProfile::from(user),
    };
    let mut response = match status {
        StatusCode::CREATED => created(body).into_response(),
        _ => ok(body).into_response(),
    };
    append_set_cookie(&mut response, &cookie)?;
    Ok(response)
}

async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Response, AppError> {
    let email = normalize_email(&req.email)?;
    let username = normalize_username(&req.username)?;
    validate_password(&req.password)?;

    let user = User::new(&email, &username, hash_password(&req.password)?);

    state.store().create_user(&user).map_err(|e| match e {
        StoreError::Conflict { .. } => {
            AppError::conflict("AUTH_EMAIL_EXISTS", "Email already registered")
        }
        other => other.into(),
    })?;
    tracing::info!(user_id = %user.id, "User registered");

    let issued = issue_access_token(&user.id, &state)?;
    auth_response(StatusCode::CREATED, &user, issued)
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let user = state.store().get_user_by_email(req.email.trim())?;

    let Some(user) = user else {
        // 不存在的账号也做一次校验，响应时间不暴露账号是否存在
        let _ = verify_password(&req.password, DUMMY_PASSWORD_HASH);
        return Err(AppError::unauthorized("Invalid email or password"));
    };

    if !verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    let issued = issue_access_token(&user.id, &state)?;
    tracing::info!(user_id = %user.id, "User logged in");
    auth_response(StatusCode::OK, &user, issued)
}

/// 只注销当前令牌对应的会话
async fn logout(auth: AuthUser, State(state): State<AppState>) -> Result<Response, AppError> {
    state.store().delete_session(&auth.token_hash)?;

    let mut response = ok(serde_json::json!({ "loggedOut": true })).into_response();
    append_set_cookie(&mut response, &cleared_token_cookie())?;
    Ok(response)
}

async fn me(auth: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let user = state
        .store()
        .get_user_by_id(&auth.user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ok(UserProfile::from(&user)))
}

fn append_set_cookie(response: &mut Response, cookie: &str) -> Result<(), AppError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| AppError::internal(&format!("set-cookie header invalid: {e}")))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}
