use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    routes::employees::{fetch_documents, fetch_employee, EmployeeResponse},
    routes::settings,
    AppState,
};

/// Public endpoints behind the QR badge scan. The profile stays locked until
/// the caller presents the current access PIN; the unlock is per-request,
/// the server keeps no session.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id", get(locked_profile))
        .route("/:id/unlock", post(unlock_profile))
}

#[derive(Debug, Serialize)]
pub struct LockedProfileResponse {
    pub id: String,
    pub name: String,
    pub locked: bool,
}

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<EmployeeResponse>,
}

async fn locked_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LockedProfileResponse>> {
    let employee = fetch_employee(&state.db.pool, &id).await?;

    Ok(Json(LockedProfileResponse {
        id: employee.id,
        name: employee.name,
        locked: true,
    }))
}

async fn unlock_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UnlockRequest>,
) -> Result<Json<UnlockResponse>> {
    let employee = fetch_employee(&state.db.pool, &id).await?;

    let current = settings::current_pin(&state.db.pool).await?;
    if body.pin != current.pin {
        return Ok(Json(UnlockResponse {
            valid: false,
            profile: None,
        }));
    }

    let documents = fetch_documents(&state.db.pool, &id).await?;

    Ok(Json(UnlockResponse {
        valid: true,
        profile: Some(EmployeeResponse {
            employee,
            documents,
        }),
    }))
}
