//! Website content endpoints: services, pricing packages, portfolio.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::collections::{check_id, ListResponse, Present};
use super::error::ApiError;
use crate::models::Ordered;
use crate::panels::selectors::active_in_display_order;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    /// Only visible entries, in display order (what the public site shows)
    #[serde(default)]
    pub active: bool,
}

pub async fn list_catalog<T: Present + Ordered>(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ListResponse<T>>, ApiError> {
    let collection = state.mutator::<T>().load().await?;
    let mut all = collection.items();
    all.sort_by_key(|item| item.order());

    let shown = if query.active {
        active_in_display_order(&all).into_iter().cloned().collect()
    } else {
        all.clone()
    };

    Ok(Json(ListResponse::new(&all, shown, collection.malformed_count())))
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    /// Target index in display order, 0-based
    pub position: usize,
}

/// Returns the whole collection in its new order
pub async fn reorder<T: Present + Ordered>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Vec<T>>, ApiError> {
    check_id(&id)?;
    let items = state.mutator::<T>().reorder(&id, request.position).await?;
    Ok(Json(items.into_iter().map(Present::present).collect()))
}

/// Show or hide an entry on the public site
pub async fn toggle<T: Present + Ordered>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<T>, ApiError> {
    check_id(&id)?;
    let item = state.mutator::<T>().toggle_active(&id).await?;
    tracing::info!(id = %id, active = item.is_active(), "Toggled {}", T::KIND);
    Ok(Json(item.present()))
}
