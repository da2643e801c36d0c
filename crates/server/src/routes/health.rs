use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{error::Result, AppState};

/// Diagnostic probes; public like the plain /health route.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/db", get(db_check))
        .route("/storage", get(storage_check))
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub status: &'static str,
}

async fn db_check(State(state): State<AppState>) -> Result<Json<CheckResponse>> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db.pool)
        .await?;

    Ok(Json(CheckResponse { status: "ok" }))
}

async fn storage_check(State(state): State<AppState>) -> Result<Json<CheckResponse>> {
    state.storage.write(".healthcheck", b"ok").await?;
    state.storage.delete(".healthcheck").await?;

    Ok(Json(CheckResponse { status: "ok" }))
}
