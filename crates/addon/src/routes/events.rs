//! Platform event webhooks.
//!
//! Events are queued and acknowledged with `202 Accepted`; the sync result
//! is only visible in logs and the sync records. A full queue answers `503`
//! so the platform can retry later.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::instrument;

use crate::error::AppError;
use crate::events::{EntitySaved, OrderFinalized, SyncEvent};
use crate::state::AppState;

/// Acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Queued {
    pub queued: bool,
    pub event: &'static str,
}

/// POST /events - any event, tagged by its `event` field.
#[instrument(skip(state, event), fields(event = event.name()))]
pub async fn publish(
    State(state): State<AppState>,
    Json(event): Json<SyncEvent>,
) -> Result<(StatusCode, Json<Queued>), AppError> {
    enqueue(&state, event)
}

/// POST /events/entity-saved - a person or company contact was saved.
#[instrument(skip(state, event), fields(contact_id = %event.contact.id))]
pub async fn entity_saved(
    State(state): State<AppState>,
    Json(event): Json<EntitySaved>,
) -> Result<(StatusCode, Json<Queued>), AppError> {
    enqueue(&state, event.into())
}

/// POST /events/order-finalized - an order was finalized.
#[instrument(skip(state, event), fields(order_id = %event.order.id))]
pub async fn order_finalized(
    State(state): State<AppState>,
    Json(event): Json<OrderFinalized>,
) -> Result<(StatusCode, Json<Queued>), AppError> {
    enqueue(&state, event.into())
}

fn enqueue(state: &AppState, event: SyncEvent) -> Result<(StatusCode, Json<Queued>), AppError> {
    let name = event.name();
    state.queue().publish(event).inspect_err(|e| {
        tracing::warn!(event = name, error = %e, "Failed to queue event");
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(Queued {
            queued: true,
            event: name,
        }),
    ))
}
