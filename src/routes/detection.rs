use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::AuthUser;
use crate::constants::MAX_FACES_PER_FRAME;
use crate::detection::config::DetectionOverrides;
use crate::detection::landmarks::{ContourFrame, LandmarkFrame};
use crate::extractors::{JsonBody, PageQuery};
use crate::response::{created, ok, paginated, AppError};
use crate::routes::events;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(start_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/frames", post(submit_frame))
        .route("/sessions/:id/stop", post(stop_session))
        .route("/sessions/:id/events", get(events::session_events))
}

/// 请求体中未给出的参数取服务端默认值
async fn start_session(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(overrides): JsonBody<DetectionOverrides>,
) -> Result<impl IntoResponse, AppError> {
    let config = state.registry().defaults().with_overrides(&overrides);
    config.validate()?;

    let record = state.registry().start(&auth.user_id, config).await?;
    tracing::info!(
        user_id = %auth.user_id,
        session_id = %record.id,
        ear_threshold = config.ear_threshold,
        min_consecutive_frames = config.min_consecutive_frames,
        window_secs = config.window_duration_seconds,
        "Detection session created"
    );
    Ok(created(record))
}

async fn submit_frame(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(frame): JsonBody<LandmarkFrame>,
) -> Result<impl IntoResponse, AppError> {
    if frame.faces.len() > MAX_FACES_PER_FRAME {
        return Err(AppError::bad_request(
            "DETECTION_TOO_MANY_FACES",
            &format!("At most {MAX_FACES_PER_FRAME} faces per frame"),
        ));
    }
    let contours = ContourFrame::try_from(&frame)?;
    let outcome = state
        .registry()
        .submit_frame(&auth.user_id, &id, contours)
        .await?;
    Ok(ok(outcome))
}

async fn stop_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.registry().stop(&auth.user_id, &id).await?;
    Ok(ok(record))
}

async fn get_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.registry().view(&auth.user_id, &id).await?;
    Ok(ok(view))
}

async fn list_sessions(
    auth: AuthUser,
    State(state): State<AppState>,
    page: PageQuery,
) -> Result<impl IntoResponse, AppError> {
    let (items, total) =
        state
            .store()
            .list_user_detection_sessions(&auth.user_id, page.limit(), page.offset())?;
    Ok(paginated(items, total, page.page, page.per_page))
}
