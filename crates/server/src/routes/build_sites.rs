use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::models::BuildSite,
    error::{AppError, Result},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_build_sites).post(create_build_site))
        .route(
            "/:id",
            get(get_build_site)
                .put(update_build_site)
                .delete(delete_build_site),
        )
}

#[derive(Debug, Deserialize)]
pub struct BuildSitePayload {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BuildSiteListResponse {
    pub build_sites: Vec<BuildSite>,
}

async fn fetch_build_site(pool: &sqlx::SqlitePool, id: &str) -> Result<BuildSite> {
    sqlx::query_as::<_, BuildSite>(
        "SELECT id, name, address, city, postal_code, contact_name, contact_phone, contact_email, notes, created_at, updated_at
         FROM build_sites WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Build site not found".to_string()))
}

async fn list_build_sites(State(state): State<AppState>) -> Result<Json<BuildSiteListResponse>> {
    let build_sites = sqlx::query_as::<_, BuildSite>(
        "SELECT id, name, address, city, postal_code, contact_name, contact_phone, contact_email, notes, created_at, updated_at
         FROM build_sites ORDER BY name ASC",
    )
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(BuildSiteListResponse { build_sites }))
}

async fn create_build_site(
    State(state): State<AppState>,
    Json(body): Json<BuildSitePayload>,
) -> Result<(StatusCode, Json<BuildSite>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Build site name is required".to_string(),
        ));
    }

    let site_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO build_sites (id, name, address, city, postal_code, contact_name, contact_phone, contact_email, notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&site_id)
    .bind(&body.name)
    .bind(&body.address)
    .bind(&body.city)
    .bind(&body.postal_code)
    .bind(&body.contact_name)
    .bind(&body.contact_phone)
    .bind(&body.contact_email)
    .bind(&body.notes)
    .bind(&now)
    .bind(&now)
    .execute(&state.db.pool)
    .await?;

    let site = fetch_build_site(&state.db.pool, &site_id).await?;

    Ok((StatusCode::CREATED, Json(site)))
}

async fn get_build_site(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BuildSite>> {
    let site = fetch_build_site(&state.db.pool, &id).await?;
    Ok(Json(site))
}

async fn update_build_site(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BuildSitePayload>,
) -> Result<Json<BuildSite>> {
    fetch_build_site(&state.db.pool, &id).await?;

    if body.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Build site name is required".to_string(),
        ));
    }

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE build_sites SET name = ?, address = ?, city = ?, postal_code = ?, contact_name = ?, contact_phone = ?, contact_email = ?, notes = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&body.name)
    .bind(&body.address)
    .bind(&body.city)
    .bind(&body.postal_code)
    .bind(&body.contact_name)
    .bind(&body.contact_phone)
    .bind(&body.contact_email)
    .bind(&body.notes)
    .bind(&now)
    .bind(&id)
    .execute(&state.db.pool)
    .await?;

    let site = fetch_build_site(&state.db.pool, &id).await?;
    Ok(Json(site))
}

async fn delete_build_site(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    fetch_build_site(&state.db.pool, &id).await?;

    // Employees referencing this site fall back to NULL via the FK
    sqlx::query("DELETE FROM build_sites WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    Ok(Json(()))
}
