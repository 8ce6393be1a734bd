use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::detection::{ConfigurationError, GeometryError};
use crate::store::StoreError;

const REDACTED_MESSAGE: &str = "服务器内部错误";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

/// 列表接口的分页包装
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// 所有错误响应的统一形状，traceId 由 request_id 中间件补上
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    /// false 表示非预期故障：记 error 日志，消息不返回给客户端
    pub is_operational: bool,
}

impl AppError {
    fn operational(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: true,
        }
    }

    pub fn bad_request(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, "AUTH_UNAUTHORIZED", message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::CONFLICT, code, message)
    }

    pub fn too_many_requests(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::TOO_MANY_REQUESTS, code, message)
    }

    pub fn internal(message: &str) -> Self {
        Self {
            is_operational: false,
            ..Self::operational(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            tracing::warn!(status = %self.status, code = %self.code, error = %self.message, "API error");
            self.message
        } else {
            tracing::error!(status = %self.status, code = %self.code, error = %self.message, "Internal API error");
            REDACTED_MESSAGE.to_string()
        };

        let body = ErrorBody {
            success: false,
            code: self.code,
            message,
            trace_id: None,
        };
        (self.status, Json(body)).into_response()
    }
}

/// 校验错误可以原样返回；sled 和序列化故障一律按内部错误处理
impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match &value {
            StoreError::Validation(msg) => AppError::bad_request("VALIDATION_ERROR", msg),
            StoreError::NotFound { entity, .. } => {
                AppError::not_found(&format!("{entity} not found"))
            }
            StoreError::Conflict { entity, .. } => {
                AppError::conflict("CONFLICT", &format!("{entity} already exists"))
            }
            _ => AppError::internal(&value.to_string()),
        }
    }
}

impl From<ConfigurationError> for AppError {
    fn from(value: ConfigurationError) -> Self {
        AppError::bad_request("DETECTION_INVALID_CONFIG", &value.to_string())
    }
}

impl From<GeometryError> for AppError {
    fn from(value: GeometryError) -> Self {
        AppError::bad_request("DETECTION_INVALID_LANDMARKS", &value.to_string())
    }
}

fn success<T: Serialize>(status: StatusCode, data: T) -> impl IntoResponse {
    (status, Json(ApiResponse { success: true, data }))
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    success(StatusCode::OK, data)
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    success(StatusCode::CREATED, data)
}

pub fn paginated<T: Serialize>(
    data: Vec<T>,
    total: u64,
    page: u64,
    per_page: u64,
) -> impl IntoResponse {
    let total_pages = match per_page {
        0 => 0,
        n => total.div_ceil(n),
    };
    success(
        StatusCode::OK,
        PaginatedResponse {
            data,
            total,
            page,
            per_page,
            total_pages,
        },
    )
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let json = body_json(AppError::internal("sled io failure").into_response()).await;
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["message"], REDACTED_MESSAGE);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn configuration_error_is_reported_with_value() {
        let err = ConfigurationError::MinConsecutiveFrames {
            value: 42,
            min: 2,
            max: 10,
        };
        let resp = AppError::from(err).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["code"], "DETECTION_INVALID_CONFIG");
        assert!(json["message"].as_str().unwrap().contains("42"));
    }

    #[test]
    fn geometry_error_is_bad_landmarks() {
        let err = AppError::from(GeometryError::DegenerateContour);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "DETECTION_INVALID_LANDMARKS");
    }

    #[test]
    fn store_errors_keep_their_meaning() {
        let not_found = AppError::from(StoreError::NotFound {
            entity: "detection_session".into(),
            key: "s1".into(),
        });
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let conflict = AppError::from(StoreError::Conflict {
            entity: "user".into(),
            key: "u1".into(),
        });
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let invalid = AppError::from(StoreError::Validation("bad key".into()));
        assert_eq!(invalid.code, "VALIDATION_ERROR");
        assert!(invalid.is_operational);
    }

    #[tokio::test]
    async fn paginated_counts_pages() {
        let json = body_json(paginated(vec![1, 2], 5, 1, 2).into_response()).await;
        assert_eq!(json["data"]["totalPages"], 3);
        assert_eq!(json["data"]["perPage"], 2);

        let json = body_json(paginated(Vec::<u8>::new(), 0, 1, 20).into_response()).await;
        assert_eq!(json["data"]["totalPages"], 0);
    }
}
