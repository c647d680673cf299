use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::collections::{check_id, ListResponse, Present};
use super::error::ApiError;
use crate::collection::CollectionError;
use crate::models::StaffMember;
use crate::panels::selectors::active_staff;
use crate::validation::FieldErrors;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StaffQuery {
    /// Only members with `status = active`
    #[serde(default)]
    pub active: bool,
    pub department: Option<String>,
}

pub async fn list_staff(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StaffQuery>,
) -> Result<Json<ListResponse<StaffMember>>, ApiError> {
    let collection = state.mutator::<StaffMember>().load().await?;
    let all = collection.items();

    let mut shown: Vec<StaffMember> = if query.active {
        active_staff(&all).into_iter().cloned().collect()
    } else {
        all.clone()
    };
    if let Some(department) = query.department.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        shown.retain(|m| m.department.eq_ignore_ascii_case(department));
    }

    Ok(Json(ListResponse::new(&all, shown, collection.malformed_count())))
}

fn role_error(message: String) -> CollectionError {
    let mut errors = FieldErrors::new();
    errors.add("role", message);
    CollectionError::ValidationFailed(errors)
}

/// Move the member one step up the role ladder
pub async fn promote_staff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StaffMember>, ApiError> {
    check_id(&id)?;
    let member = state
        .mutator::<StaffMember>()
        .modify(&id, |member| member.promote().map(|_| ()).map_err(role_error))
        .await?;
    tracing::info!(id = %id, role = %member.role, "Promoted staff member");
    Ok(Json(member.present()))
}

/// Move the member one step down the role ladder
pub async fn demote_staff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StaffMember>, ApiError> {
    check_id(&id)?;
    let member = state
        .mutator::<StaffMember>()
        .modify(&id, |member| member.demote().map(|_| ()).map_err(role_error))
        .await?;
    tracing::info!(id = %id, role = %member.role, "Demoted staff member");
    Ok(Json(member.present()))
}

/// Soft delete: the member stays on file as inactive and fired
pub async fn fire_staff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StaffMember>, ApiError> {
    check_id(&id)?;
    let member = state.mutator::<StaffMember>().delete(&id).await?.into_inner();
    Ok(Json(member.present()))
}
