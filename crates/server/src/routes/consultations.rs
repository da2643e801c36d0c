use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::models::Consultation,
    error::{AppError, Result},
    AppState,
};

/// Consultation funnel submissions from the public site.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(submit_consultation))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_consultations))
        .route("/:id", axum::routing::delete(delete_consultation))
}

#[derive(Debug, Deserialize)]
pub struct SubmitConsultationRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsultationListResponse {
    pub consultations: Vec<Consultation>,
}

async fn submit_consultation(
    State(state): State<AppState>,
    Json(body): Json<SubmitConsultationRequest>,
) -> Result<(StatusCode, Json<Consultation>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if body.phone.trim().is_empty() {
        return Err(AppError::Validation("Phone number is required".to_string()));
    }

    let consultation_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO consultations (id, name, phone, email, service, message, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&consultation_id)
    .bind(&body.name)
    .bind(&body.phone)
    .bind(&body.email)
    .bind(&body.service)
    .bind(&body.message)
    .bind(&now)
    .execute(&state.db.pool)
    .await?;

    let consultation = sqlx::query_as::<_, Consultation>(
        "SELECT id, name, phone, email, service, message, created_at FROM consultations WHERE id = ?",
    )
    .bind(&consultation_id)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(consultation)))
}

async fn list_consultations(
    State(state): State<AppState>,
) -> Result<Json<ConsultationListResponse>> {
    let consultations = sqlx::query_as::<_, Consultation>(
        "SELECT id, name, phone, email, service, message, created_at FROM consultations ORDER BY created_at DESC",
    )
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(ConsultationListResponse { consultations }))
}

async fn delete_consultation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM consultations WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db.pool)
        .await?;

    if exists == 0 {
        return Err(AppError::NotFound("Consultation not found".to_string()));
    }

    sqlx::query("DELETE FROM consultations WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    Ok(Json(()))
}
