use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::auth::AuthUser;
use crate::extractors::PageQuery;
use crate::response::{paginated, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_verdicts))
}

/// 当前用户全部会话的窗口结论，最新的在前
async fn list_verdicts(
    auth: AuthUser,
    State(state): State<AppState>,
    page: PageQuery,
) -> Result<impl IntoResponse, AppError> {
    let (items, total) =
        state
            .store()
            .list_user_verdicts(&auth.user_id, page.limit(), page.offset())?;
    Ok(paginated(items, total, page.page, page.per_page))
}
