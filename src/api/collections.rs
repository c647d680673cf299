//! CRUD handlers shared by every collection endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::error::ApiError;
use crate::collection::Deletion;
use crate::forms::FormState;
use crate::models::{
    ClientProject, Entity, PortfolioProject, PricingPackage, Project, Service, StaffMember, Ticket,
};
use crate::panels::PanelStats;
use crate::validation::validate_entity_id;
use crate::AppState;

/// Entities served over the API
pub trait Present: Entity + PanelStats {
    /// The record as returned to clients
    fn present(self) -> Self {
        self
    }
}

impl Present for StaffMember {
    fn present(self) -> Self {
        self.redacted()
    }
}

impl Present for Ticket {}
impl Present for Project {}
impl Present for ClientProject {}
impl Present for Service {}
impl Present for PricingPackage {}
impl Present for PortfolioProject {}

#[derive(Serialize)]
pub struct ListResponse<T: PanelStats> {
    pub items: Vec<T>,
    /// Aggregates over the whole collection, before any filter
    pub stats: T::Stats,
    /// Stored records that could not be decoded
    pub malformed: usize,
}

impl<T: Present> ListResponse<T> {
    pub fn new(all: &[T], shown: Vec<T>, malformed: usize) -> Self {
        Self {
            stats: T::summarize(all),
            items: shown.into_iter().map(Present::present).collect(),
            malformed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse<T> {
    pub id: String,
    /// True when the record was kept and marked as removed
    pub soft: bool,
    pub item: T,
}

/// Reject ids the store cannot use as keys
pub fn check_id(id: &str) -> Result<(), ApiError> {
    validate_entity_id(id, "id").map_err(|e| ApiError::validation_field("id", e))
}

/// The request body as a JSON object
pub fn body_object(body: Value) -> Result<serde_json::Map<String, Value>, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request("Request body must be a JSON object")),
    }
}

pub async fn list<T: Present>(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListResponse<T>>, ApiError> {
    let collection = state.mutator::<T>().load().await?;
    let items = collection.items();
    Ok(Json(ListResponse::new(
        &items,
        items.clone(),
        collection.malformed_count(),
    )))
}

pub async fn get_one<T: Present>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<T>, ApiError> {
    check_id(&id)?;
    let item = state.mutator::<T>().get(&id).await?;
    Ok(Json(item.present()))
}

/// Create through the form controller so invalid input never reaches the
/// store
pub async fn create<T: Present>(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<T>), ApiError> {
    let mut form = FormState::<T>::create();
    form.apply(body_object(body)?);
    let item = form.submit(&state.mutator::<T>()).await?;
    Ok((StatusCode::CREATED, Json(item.present())))
}

pub async fn update<T: Present>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<T>, ApiError> {
    check_id(&id)?;
    let patch = body_object(patch)?;
    let item = state.mutator::<T>().update(&id, Value::Object(patch)).await?;
    Ok(Json(item.present()))
}

pub async fn remove<T: Present>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse<T>>, ApiError> {
    check_id(&id)?;
    let deletion = state.mutator::<T>().delete(&id).await?;
    let soft = matches!(deletion, Deletion::Deactivated(_));
    Ok(Json(DeleteResponse {
        id,
        soft,
        item: deletion.into_inner().present(),
    }))
}
