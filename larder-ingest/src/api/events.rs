//! SSE event stream endpoint
//!
//! GET /events forwards every workflow event from the bus to the client so
//! the presentation layer can watch submissions move through extraction
//! without polling the HTTP API.

use axum::{extract::State, response::sse::Event, response::Sse};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(
        subscribers = state.event_bus.subscriber_count(),
        "SSE client connected"
    );
    larder_common::sse::event_sse_stream(state.event_bus.subscribe())
}
