use axum::http::Method;
use axum::Router;

use super::http::{request, response_json};

pub const TEST_PASSWORD: &str = "Passw0rd!";

pub struct RegisteredUser {
    pub email: String,
    pub token: String,
    pub user_id: String,
}

pub async fn register_user(app: &Router) -> RegisteredUser {
    let email = format!("user-{}@test.com", uuid::Uuid::new_v4());
    let username = format!("user-{}", uuid::Uuid::new_v4().simple());

    let response = request(
        app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": email,
            "username": &username[..20],
            "password": TEST_PASSWORD,
        })),
        &[],
    )
    .await;

    let (status, _headers, body) = response_json(response).await;
    assert!(status.is_success(), "register failed: {body}");

    RegisteredUser {
        email,
        token: body["data"]["accessToken"]
            .as_str()
            .expect("access token in register response")
            .to_string(),
        user_id: body["data"]["user"]["id"]
            .as_str()
            .expect("user id in register response")
            .to_string(),
    }
}

pub async fn login_and_get_token(app: &Router) -> String {
    register_user(app).await.token
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn bearer(token: &str) -> [(&'static str, String); 1] {
    [("authorization", auth_header(token))]
}
