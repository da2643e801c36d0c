use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::models::{Feedback, FeedbackStatus},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    AppState,
};

/// Submission endpoint mounted on the public site.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(submit_feedback))
}

/// Triage endpoints for the admin panel.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_feedback))
        .route("/:id", axum::routing::delete(delete_feedback))
        .route("/:id/status", put(update_status))
}

#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub message: String,
    pub email: Option<String>,
    pub url: Option<String>,
    pub viewport: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub id: String,
    pub message: String,
    pub email: Option<String>,
    pub url: Option<String>,
    pub viewport: Option<String>,
    pub screenshots: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackListResponse {
    pub feedback: Vec<FeedbackResponse>,
}

impl From<Feedback> for FeedbackResponse {
    fn from(row: Feedback) -> Self {
        let screenshots = serde_json::from_str(&row.screenshots).unwrap_or_default();
        Self {
            id: row.id,
            message: row.message,
            email: row.email,
            url: row.url,
            viewport: row.viewport,
            screenshots,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

const FEEDBACK_SELECT: &str =
    "SELECT id, message, email, url, viewport, screenshots, status, created_at FROM feedback";

async fn fetch_feedback(pool: &sqlx::SqlitePool, id: &str) -> Result<Feedback> {
    sqlx::query_as::<_, Feedback>(&format!("{FEEDBACK_SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Feedback not found".to_string()))
}

async fn submit_feedback(
    State(state): State<AppState>,
    Json(body): Json<SubmitFeedbackRequest>,
) -> Result<(StatusCode, Json<FeedbackResponse>)> {
    if body.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }

    let feedback_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let screenshots = serde_json::to_string(&body.screenshots)
        .map_err(|e| AppError::Internal(format!("Failed to encode screenshots: {e}")))?;

    sqlx::query(
        "INSERT INTO feedback (id, message, email, url, viewport, screenshots, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&feedback_id)
    .bind(&body.message)
    .bind(&body.email)
    .bind(&body.url)
    .bind(&body.viewport)
    .bind(&screenshots)
    .bind(FeedbackStatus::New.as_str())
    .bind(&now)
    .execute(&state.db.pool)
    .await?;

    let row = fetch_feedback(&state.db.pool, &feedback_id).await?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

async fn list_feedback(State(state): State<AppState>) -> Result<Json<FeedbackListResponse>> {
    let rows = sqlx::query_as::<_, Feedback>(&format!("{FEEDBACK_SELECT} ORDER BY created_at DESC"))
        .fetch_all(&state.db.pool)
        .await?;

    Ok(Json(FeedbackListResponse {
        feedback: rows.into_iter().map(FeedbackResponse::from).collect(),
    }))
}

async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<FeedbackResponse>> {
    let status = FeedbackStatus::parse(&body.status).ok_or_else(|| {
        AppError::Validation(format!("Unknown feedback status: {}", body.status))
    })?;

    fetch_feedback(&state.db.pool, &id).await?;

    sqlx::query("UPDATE feedback SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    tracing::info!("Feedback {id} set to {} by {}", status.as_str(), user.email);

    let row = fetch_feedback(&state.db.pool, &id).await?;
    Ok(Json(row.into()))
}

async fn delete_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    fetch_feedback(&state.db.pool, &id).await?;

    sqlx::query("DELETE FROM feedback WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    Ok(Json(()))
}
