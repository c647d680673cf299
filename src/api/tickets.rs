use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::collections::{check_id, ListResponse};
use super::error::ApiError;
use crate::models::{Priority, Ticket, TicketStatus};
use crate::panels::selectors::tickets_by_assignee;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    /// Assignee name or email
    pub assignee: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TicketQuery>,
) -> Result<Json<ListResponse<Ticket>>, ApiError> {
    let collection = state.mutator::<Ticket>().load().await?;
    let all = collection.items();

    let mut shown: Vec<Ticket> = match query.assignee.as_deref() {
        Some(assignee) => tickets_by_assignee(&all, assignee).into_iter().cloned().collect(),
        None => all.clone(),
    };
    if let Some(status) = query.status {
        shown.retain(|t| t.status == status);
    }
    if let Some(priority) = query.priority {
        shown.retain(|t| t.priority == priority);
    }

    Ok(Json(ListResponse::new(&all, shown, collection.malformed_count())))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: TicketStatus,
}

/// Move a ticket to another status
pub async fn set_ticket_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Ticket>, ApiError> {
    check_id(&id)?;
    let ticket = state
        .mutator::<Ticket>()
        .modify(&id, |ticket| {
            ticket.status = change.status;
            Ok(())
        })
        .await?;
    tracing::info!(id = %id, status = %ticket.status.as_str(), "Ticket status changed");
    Ok(Json(ticket))
}
