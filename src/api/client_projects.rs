//! Client project roadmaps: phases, their tasks, and the project team.
//!
//! Every change goes through the parent record so progress, status, phase
//! completion and the next milestone are recomputed on each write.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use super::collections::{body_object, check_id};
use super::error::ApiError;
use crate::collection::{SubEntityChange, SubEntityTarget};
use crate::models::ClientProject;
use crate::AppState;

async fn apply(
    state: &AppState,
    id: &str,
    target: SubEntityTarget,
    change: SubEntityChange,
) -> Result<ClientProject, ApiError> {
    check_id(id)?;
    Ok(state
        .mutator::<ClientProject>()
        .mutate_sub_entity(id, &target, change)
        .await?)
}

fn phase_tasks(phase_id: &str) -> Result<SubEntityTarget, ApiError> {
    check_id(phase_id)?;
    Ok(SubEntityTarget::new("tasks").within("roadmap", phase_id))
}

/// Append a roadmap phase
pub async fn add_phase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(phase): Json<Value>,
) -> Result<(StatusCode, Json<ClientProject>), ApiError> {
    let phase = body_object(phase)?;
    let project = apply(
        &state,
        &id,
        SubEntityTarget::new("roadmap"),
        SubEntityChange::Add(Value::Object(phase)),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Patch a roadmap phase
pub async fn update_phase(
    State(state): State<Arc<AppState>>,
    Path((id, phase_id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<Json<ClientProject>, ApiError> {
    check_id(&phase_id)?;
    let patch = body_object(patch)?;
    let project = apply(
        &state,
        &id,
        SubEntityTarget::new("roadmap").item(phase_id),
        SubEntityChange::Patch(patch),
    )
    .await?;
    Ok(Json(project))
}

/// Remove a roadmap phase and its tasks
pub async fn delete_phase(
    State(state): State<Arc<AppState>>,
    Path((id, phase_id)): Path<(String, String)>,
) -> Result<Json<ClientProject>, ApiError> {
    check_id(&phase_id)?;
    let project = apply(
        &state,
        &id,
        SubEntityTarget::new("roadmap").item(phase_id),
        SubEntityChange::Remove,
    )
    .await?;
    Ok(Json(project))
}

/// Append a task to a phase
pub async fn add_task(
    State(state): State<Arc<AppState>>,
    Path((id, phase_id)): Path<(String, String)>,
    Json(task): Json<Value>,
) -> Result<(StatusCode, Json<ClientProject>), ApiError> {
    let target = phase_tasks(&phase_id)?;
    let task = body_object(task)?;
    let project = apply(&state, &id, target, SubEntityChange::Add(Value::Object(task))).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Patch a task
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path((id, phase_id, task_id)): Path<(String, String, String)>,
    Json(patch): Json<Value>,
) -> Result<Json<ClientProject>, ApiError> {
    check_id(&task_id)?;
    let target = phase_tasks(&phase_id)?.item(task_id);
    let patch = body_object(patch)?;
    let project = apply(&state, &id, target, SubEntityChange::Patch(patch)).await?;
    Ok(Json(project))
}

/// Remove a task
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path((id, phase_id, task_id)): Path<(String, String, String)>,
) -> Result<Json<ClientProject>, ApiError> {
    check_id(&task_id)?;
    let target = phase_tasks(&phase_id)?.item(task_id);
    let project = apply(&state, &id, target, SubEntityChange::Remove).await?;
    Ok(Json(project))
}

/// Flip a task between done and not done
pub async fn toggle_task(
    State(state): State<Arc<AppState>>,
    Path((id, phase_id, task_id)): Path<(String, String, String)>,
) -> Result<Json<ClientProject>, ApiError> {
    check_id(&task_id)?;
    let target = phase_tasks(&phase_id)?.item(task_id);
    let project = apply(
        &state,
        &id,
        target,
        SubEntityChange::Toggle("completed".to_string()),
    )
    .await?;
    Ok(Json(project))
}

/// Add someone to the project team
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(member): Json<Value>,
) -> Result<(StatusCode, Json<ClientProject>), ApiError> {
    let member = body_object(member)?;
    let project = apply(
        &state,
        &id,
        SubEntityTarget::new("teamMembers"),
        SubEntityChange::Add(Value::Object(member)),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Remove someone from the project team
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((id, member_id)): Path<(String, String)>,
) -> Result<Json<ClientProject>, ApiError> {
    check_id(&member_id)?;
    let project = apply(
        &state,
        &id,
        SubEntityTarget::new("teamMembers").item(member_id),
        SubEntityChange::Remove,
    )
    .await?;
    Ok(Json(project))
}
