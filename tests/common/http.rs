use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

/// 通过 oneshot 直接驱动路由，不经过网络
pub async fn request(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    headers: &[(&str, String)],
) -> Response {
    let builder = headers
        .iter()
        .fold(Request::builder().method(method).uri(path), |b, (k, v)| {
            b.header(*k, v.as_str())
        });

    let req = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).expect("encode json body"))),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    app.clone().oneshot(req).await.expect("router is infallible")
}

/// 空响应体解析为 `{}`
pub async fn response_json(resp: Response) -> (StatusCode, HeaderMap, Value) {
    let (parts, body) = resp.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.expect("read body");
    let json = if bytes.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            panic!("body is not json ({e}): {}", String::from_utf8_lossy(&bytes))
        })
    };
    (parts.status, parts.headers, json)
}

pub async fn send_json(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    headers: &[(&str, String)],
) -> (StatusCode, Value) {
    let (status, _, json) = response_json(request(app, method, path, body, headers).await).await;
    (status, json)
}

pub fn assert_json_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false, "expected an error body: {body}");
    assert_eq!(body["code"], code, "unexpected error code: {body}");
    assert!(body["message"].is_string(), "error without message: {body}");
}

pub fn assert_status_ok_json(status: StatusCode, body: &Value) {
    assert!(status.is_success(), "unexpected status {status}: {body}");
    assert_eq!(body["success"], true, "expected a success body: {body}");
    assert!(!body["data"].is_null(), "success without data: {body}");
}
