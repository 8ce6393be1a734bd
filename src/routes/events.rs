use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::auth::AuthUser;
use crate::detection::pipeline::SessionEvent;
use crate::response::AppError;
use crate::state::AppState;

/// 会话事件流：先推一次当前状态，之后转发 blink / verdict，收到 stopped 或服务关闭即结束
pub async fn session_events(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (events, status) = state.registry().subscribe(&auth.user_id, &id).await?;
    let mut shutdown_rx = state.shutdown_rx();
    let mut events = BroadcastStream::new(events);
    let session_id = id;

    let stream = async_stream::stream! {
        if let Ok(json) = serde_json::to_string(&status) {
            yield Ok(Event::default().event("status").data(json));
        }

        loop {
            tokio::select! {
                item = events.next() => {
                    match item {
                        Some(Ok(event)) => {
                            let done = matches!(event, SessionEvent::Stopped { .. });
                            match serde_json::to_string(&event) {
                                Ok(json) => yield Ok(Event::default().event(event.name()).data(json)),
                                Err(e) => tracing::warn!(error = %e, "Failed to encode session event"),
                            }
                            if done {
                                break;
                            }
                        }
                        Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                            tracing::warn!(session_id = %session_id, skipped, "SSE subscriber lagged");
                        }
                        None => break,
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
