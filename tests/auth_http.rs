mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_app;
use common::auth::{bearer, register_user, TEST_PASSWORD};
use common::http::{assert_json_error, assert_status_ok_json, request, response_json, send_json};

#[tokio::test]
async fn it_register_returns_token_and_profile() {
    let app = spawn_test_app().await;

    let response = request(
        &app.app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": "New.User@Test.com",
            "username": "new_user",
            "password": TEST_PASSWORD,
        })),
        &[],
    )
    .await;
    let (status, headers, body) = response_json(response).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["user"]["email"], "new.user@test.com");
    assert!(body["data"]["user"].get("passwordHash").is_none());
    assert!(body["data"]["accessToken"].as_str().is_some());
    assert!(headers
        .get_all("set-cookie")
        .iter()
        .any(|v| v.to_str().unwrap_or("").starts_with("token=")));
}

#[tokio::test]
async fn it_register_rejects_duplicate_email() {
    let app = spawn_test_app().await;
    let user = register_user(&app.app).await;

    let (status, body) = send_json(
        &app.app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": user.email.to_uppercase(),
            "username": "someone",
            "password": TEST_PASSWORD,
        })),
        &[],
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "AUTH_EMAIL_EXISTS");
}

#[tokio::test]
async fn it_register_validates_input() {
    let app = spawn_test_app().await;

    let cases = [
        (
            serde_json::json!({"email": "not-an-email", "username": "ok_name", "password": TEST_PASSWORD}),
            "AUTH_INVALID_EMAIL",
        ),
        (
            serde_json::json!({"email": "a@b.com", "username": "x", "password": TEST_PASSWORD}),
            "AUTH_INVALID_USERNAME",
        ),
        (
            serde_json::json!({"email": "a@b.com", "username": "ok_name", "password": "short"}),
            "AUTH_WEAK_PASSWORD",
        ),
        (
            serde_json::json!({"email": "a@b.com"}),
            "INVALID_REQUEST_BODY",
        ),
    ];

    for (payload, code) in cases {
        let (status, body) =
            send_json(&app.app, Method::POST, "/api/auth/register", Some(payload), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{code}: {body}");
        assert_json_error(&body, code);
    }
}

#[tokio::test]
async fn it_login_and_me() {
    let app = spawn_test_app().await;
    let user = register_user(&app.app).await;

    let (status, body) = send_json(
        &app.app,
        Method::POST,
        "/api/auth/login",
        Some(serde_json::json!({ "email": user.email, "password": TEST_PASSWORD })),
        &[],
    )
    .await;
    assert_status_ok_json(status, &body);
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();

    let (status, body) = send_json(&app.app, Method::GET, "/api/auth/me", None, &bearer(&token)).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["id"], user.user_id.as_str());
}

#[tokio::test]
async fn it_login_rejects_bad_credentials() {
    let app = spawn_test_app().await;
    let user = register_user(&app.app).await;

    for (email, password) in [
        (user.email.as_str(), "Wrong-passw0rd"),
        ("nobody@test.com", TEST_PASSWORD),
    ] {
        let (status, body) = send_json(
            &app.app,
            Method::POST,
            "/api/auth/login",
            Some(serde_json::json!({ "email": email, "password": password })),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_json_error(&body, "AUTH_UNAUTHORIZED");
    }
}

#[tokio::test]
async fn it_logout_revokes_only_current_token() {
    let app = spawn_test_app().await;
    let user = register_user(&app.app).await;

    let (_, body) = send_json(
        &app.app,
        Method::POST,
        "/api/auth/login",
        Some(serde_json::json!({ "email": user.email, "password": TEST_PASSWORD })),
        &[],
    )
    .await;
    let second = body["data"]["accessToken"].as_str().unwrap().to_string();

    let (status, _) =
        send_json(&app.app, Method::POST, "/api/auth/logout", None, &bearer(&user.token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(&app.app, Method::GET, "/api/auth/me", None, &bearer(&user.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&app.app, Method::GET, "/api/auth/me", None, &bearer(&second)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn it_protected_routes_require_token() {
    let app = spawn_test_app().await;

    let (status, body) = send_json(&app.app, Method::GET, "/api/detection/sessions", None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_json_error(&body, "AUTH_UNAUTHORIZED");
    assert!(body["traceId"].is_string());

    let (status, _) = send_json(
        &app.app,
        Method::GET,
        "/api/auth/me",
        None,
        &bearer("not-a-jwt"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
