//! Server-sent event stream of sync lifecycle events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::events::ServerEvent;
use crate::main_lib::AppState;

fn to_sse_event(event: ServerEvent) -> Event {
    let data = event
        .payload
        .map(|payload| payload.to_string())
        .unwrap_or_else(|| "{}".to_string());
    Event::default().event(event.event).data(data)
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.event_bus.subscribe()).filter_map(|message| {
        match message {
            Ok(event) => Some(Ok(to_sse_event(event))),
            Err(err) => {
                warn!("SSE subscriber lagged: {}", err);
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/sync/events", get(stream_events))
}
