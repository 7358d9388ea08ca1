use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use quizroom_core::events::RoomEvent;

use crate::auth::Identity;
use crate::error::AppError;
use crate::state::{AppState, ConnectionGuard};

/// GET /api/v1/room/{room_id}/join: join a room and stream its events.
///
/// Each event is sent with its `eventType` as the SSE event name and the
/// full JSON body as data. The stream stays open until the client leaves.
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Identity(user): Identity,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, AppError> {
    let max_sse = state.config.limits.max_sse_subscribers;
    let current = state.sse_subscriber_count.load(Ordering::Relaxed);
    if current >= max_sse {
        tracing::warn!(current, max = max_sse, "SSE subscriber limit reached");
        return Err(AppError::ServiceUnavailable(
            "too many open event streams".to_string(),
        ));
    }

    let guard = ConnectionGuard::new(Arc::clone(&state.sse_subscriber_count));
    let joined = state.rooms.join_room(&room_id, &user).await?;
    let subscription = joined.subscription;

    let stream = ReceiverStream::new(joined.events).filter_map(move |event: RoomEvent| {
        let _guard = &guard;
        let _subscription = &subscription;
        match event.to_json() {
            Ok(json) => Some(Ok(SseEvent::default().event(event.event_type()).data(json))),
            Err(e) => {
                tracing::warn!(event = event.event_type(), "SSE event encode error: {e}");
                None
            },
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
