//! Live collection snapshots over server-sent events.
//!
//! Each connection mounts its own panel view and relays every snapshot the
//! store pushes, starting with the current one. Dropping the connection
//! drops the view, which cancels the store subscription.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use super::collections::Present;
use super::error::ApiError;
use crate::AppState;

fn snapshot<T: Present>(items: &[T]) -> Option<Event> {
    let payload = json!({
        "items": items.iter().cloned().map(Present::present).collect::<Vec<_>>(),
        "stats": T::summarize(items),
    });
    match Event::default().event("snapshot").json_data(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(kind = T::KIND, error = %e, "Failed to encode snapshot event");
            None
        }
    }
}

/// GET /api/<collection>/events
pub async fn stream<T: Present>(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let mut panel = state.panel::<T>();
    panel.mount().await?;
    tracing::debug!(kind = T::KIND, "Event stream opened");

    let stream = async_stream::stream! {
        while let Some(items) = panel.next_change().await {
            if let Some(event) = snapshot(items) {
                yield Ok(event);
            }
        }
        tracing::debug!(kind = T::KIND, "Event stream ended");
        yield Ok(Event::default().event("end").data("subscription closed"));
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
