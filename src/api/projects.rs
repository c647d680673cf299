use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::collections::{body_object, check_id, ListResponse};
use super::error::ApiError;
use crate::collection::{SubEntityChange, SubEntityTarget};
use crate::models::{Project, ProjectStatus};
use crate::panels::selectors::projects_by_status;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<ListResponse<Project>>, ApiError> {
    let collection = state.mutator::<Project>().load().await?;
    let all = collection.items();

    let shown = match query.status {
        Some(status) => projects_by_status(&all, status).into_iter().cloned().collect(),
        None => all.clone(),
    };

    Ok(Json(ListResponse::new(&all, shown, collection.malformed_count())))
}

/// Append a milestone; progress is recomputed
pub async fn add_milestone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(milestone): Json<Value>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    check_id(&id)?;
    let milestone = body_object(milestone)?;
    let project = state
        .mutator::<Project>()
        .mutate_sub_entity(
            &id,
            &SubEntityTarget::new("milestones"),
            SubEntityChange::Add(Value::Object(milestone)),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Patch a milestone, e.g. complete or reopen it
pub async fn update_milestone(
    State(state): State<Arc<AppState>>,
    Path((id, milestone_id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<Json<Project>, ApiError> {
    check_id(&id)?;
    check_id(&milestone_id)?;
    let patch = body_object(patch)?;
    let project = state
        .mutator::<Project>()
        .mutate_sub_entity(
            &id,
            &SubEntityTarget::new("milestones").item(milestone_id),
            SubEntityChange::Patch(patch),
        )
        .await?;
    Ok(Json(project))
}

/// Remove a milestone
pub async fn delete_milestone(
    State(state): State<Arc<AppState>>,
    Path((id, milestone_id)): Path<(String, String)>,
) -> Result<Json<Project>, ApiError> {
    check_id(&id)?;
    check_id(&milestone_id)?;
    let project = state
        .mutator::<Project>()
        .mutate_sub_entity(
            &id,
            &SubEntityTarget::new("milestones").item(milestone_id),
            SubEntityChange::Remove,
        )
        .await?;
    Ok(Json(project))
}
