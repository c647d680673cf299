//! Bearer-token gate in front of every `/api` route.
//!
//! The configured admin token admits the built-in admin profile. Any other
//! token is hashed and looked up among staff records; only an active
//! member with the admin role gets through.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
    Json,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::error::ApiError;
use crate::collection::load_collection;
use crate::models::{Entity, StaffMember, StaffRole};
use crate::AppState;

/// Staff field holding the SHA-256 hex digest of the member's API token
pub const TOKEN_HASH_FIELD: &str = "tokenHash";

/// The authenticated administrator
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub role: StaffRole,
    /// `config` for the configured token, `staff` for a staff record
    pub source: &'static str,
}

impl AdminProfile {
    fn from_config(state: &AppState) -> Self {
        Self {
            id: "admin".to_string(),
            name: state.config.auth.admin_name.clone(),
            email: String::new(),
            department: state.config.auth.admin_department.clone(),
            role: StaffRole::Admin,
            source: "config",
        }
    }

    fn from_member(member: &StaffMember) -> Self {
        Self {
            id: member.id.clone(),
            name: member.name.clone(),
            email: member.email.clone(),
            department: member.department.clone(),
            role: member.role,
            source: "staff",
        }
    }
}

/// Lowercase hex SHA-256 of a token, as stored in `tokenHash`
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Token from the `Authorization` header, or from `?token=` for
/// EventSource clients that cannot set headers
fn extract_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
        return (!token.is_empty()).then(|| token.to_string());
    }

    query.and_then(|q| {
        q.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == "token" && !value.is_empty()).then(|| value.to_string())
        })
    })
}

async fn authenticate(state: &AppState, token: &str) -> Result<AdminProfile, ApiError> {
    if constant_time_eq(token, &state.config.auth.admin_token) {
        return Ok(AdminProfile::from_config(state));
    }

    let token_hash = hash_token(token);
    let staff = load_collection::<StaffMember>(state.store.as_ref(), StaffMember::COLLECTION).await?;
    let member = staff
        .iter()
        .find(|m| {
            m.extra
                .get(TOKEN_HASH_FIELD)
                .and_then(|v| v.as_str())
                .map(|stored| constant_time_eq(stored, &token_hash))
                .unwrap_or(false)
        })
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    if !member.is_admin() {
        tracing::warn!(id = %member.id, role = %member.role, "Non-admin staff token rejected");
        return Err(ApiError::forbidden("Administrator access required"));
    }

    Ok(AdminProfile::from_member(member))
}

/// Admit active admins only; the profile is added to request extensions
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers(), request.uri().query())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let profile = authenticate(&state, &token).await?;
    request.extensions_mut().insert(profile);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminProfile {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminProfile>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Profile of the authenticated administrator
pub async fn me(profile: AdminProfile) -> Json<AdminProfile> {
    Json(profile)
}
