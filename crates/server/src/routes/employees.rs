use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::models::{Employee, EmployeeDocument},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::storage::StorageService,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_employees).post(create_employee))
        .route(
            "/:id",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/:id/image", post(upload_image))
        .route("/:id/documents", post(upload_documents))
        .route(
            "/:id/documents/:doc_id",
            axum::routing::delete(delete_document),
        )
        .route("/:id/qr-code", post(issue_qr_code))
}

#[derive(Debug, Deserialize)]
pub struct EmployeePayload {
    pub name: String,
    pub firm: Option<String>,
    pub birthdate: Option<String>,
    pub build_site_id: Option<String>,
    pub role: Option<String>,
    pub notes: Option<String>,
    pub rating: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeResponse {
    #[serde(flatten)]
    pub employee: Employee,
    pub documents: Vec<EmployeeDocument>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeListResponse {
    pub employees: Vec<Employee>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct QrCodeResponse {
    pub qr_code_url: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentUploadResponse {
    pub uploaded: Vec<EmployeeDocument>,
    pub errors: Vec<String>,
}

const EMPLOYEE_SELECT: &str = r#"
    SELECT e.id, e.name, e.firm, e.birthdate, e.build_site_id, b.name AS build_site_name,
           e.role, e.image_url, e.notes, e.rating, e.qr_code_url, e.created_at, e.updated_at
    FROM employees e
    LEFT JOIN build_sites b ON e.build_site_id = b.id
"#;

pub(crate) async fn fetch_employee(pool: &SqlitePool, id: &str) -> Result<Employee> {
    sqlx::query_as::<_, Employee>(&format!("{EMPLOYEE_SELECT} WHERE e.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))
}

pub(crate) async fn fetch_documents(pool: &SqlitePool, employee_id: &str) -> Result<Vec<EmployeeDocument>> {
    let documents = sqlx::query_as::<_, EmployeeDocument>(
        "SELECT id, employee_id, name, url, size, content_type, created_at
         FROM employee_documents WHERE employee_id = ? ORDER BY created_at ASC",
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await?;

    Ok(documents)
}

async fn validate_payload(pool: &SqlitePool, body: &EmployeePayload) -> Result<()> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Employee name is required".to_string()));
    }

    if let Some(rating) = body.rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
    }

    // Build site is a real reference, not a free-text name
    if let Some(ref site_id) = body.build_site_id {
        let exists =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM build_sites WHERE id = ?")
                .bind(site_id)
                .fetch_one(pool)
                .await?;

        if exists == 0 {
            return Err(AppError::Validation("Unknown build site".to_string()));
        }
    }

    Ok(())
}

async fn list_employees(State(state): State<AppState>) -> Result<Json<EmployeeListResponse>> {
    let employees =
        sqlx::query_as::<_, Employee>(&format!("{EMPLOYEE_SELECT} ORDER BY e.name ASC"))
            .fetch_all(&state.db.pool)
            .await?;

    Ok(Json(EmployeeListResponse { employees }))
}

async fn create_employee(
    State(state): State<AppState>,
    Json(body): Json<EmployeePayload>,
) -> Result<(StatusCode, Json<EmployeeResponse>)> {
    validate_payload(&state.db.pool, &body).await?;

    let employee_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO employees (id, name, firm, birthdate, build_site_id, role, notes, rating, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&employee_id)
    .bind(&body.name)
    .bind(&body.firm)
    .bind(&body.birthdate)
    .bind(&body.build_site_id)
    .bind(&body.role)
    .bind(&body.notes)
    .bind(body.rating)
    .bind(&now)
    .bind(&now)
    .execute(&state.db.pool)
    .await?;

    // Badge issuance is best-effort: the employee exists either way
    match state.qr.issue_for_employee(&employee_id, &body.name).await {
        Ok(url) => {
            sqlx::query("UPDATE employees SET qr_code_url = ? WHERE id = ?")
                .bind(&url)
                .bind(&employee_id)
                .execute(&state.db.pool)
                .await?;
        }
        Err(e) => {
            tracing::warn!("QR issuance failed for employee {employee_id}: {e}");
        }
    }

    let employee = fetch_employee(&state.db.pool, &employee_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(EmployeeResponse {
            employee,
            documents: Vec::new(),
        }),
    ))
}

async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EmployeeResponse>> {
    let employee = fetch_employee(&state.db.pool, &id).await?;
    let documents = fetch_documents(&state.db.pool, &id).await?;

    Ok(Json(EmployeeResponse {
        employee,
        documents,
    }))
}

async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EmployeePayload>,
) -> Result<Json<EmployeeResponse>> {
    // 404 before validation errors
    fetch_employee(&state.db.pool, &id).await?;
    validate_payload(&state.db.pool, &body).await?;

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE employees SET name = ?, firm = ?, birthdate = ?, build_site_id = ?, role = ?, notes = ?, rating = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&body.name)
    .bind(&body.firm)
    .bind(&body.birthdate)
    .bind(&body.build_site_id)
    .bind(&body.role)
    .bind(&body.notes)
    .bind(body.rating)
    .bind(&now)
    .bind(&id)
    .execute(&state.db.pool)
    .await?;

    let employee = fetch_employee(&state.db.pool, &id).await?;
    let documents = fetch_documents(&state.db.pool, &id).await?;

    Ok(Json(EmployeeResponse {
        employee,
        documents,
    }))
}

async fn delete_employee(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    fetch_employee(&state.db.pool, &id).await?;

    sqlx::query("DELETE FROM employee_documents WHERE employee_id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    tracing::info!("Employee {id} deleted by {}", user.email);

    // Stored image, documents and badge go best-effort
    if let Err(e) = state.storage.delete_prefix(&format!("employees/{id}")).await {
        tracing::warn!("Failed to remove storage for employee {id}: {e}");
    }

    Ok(Json(()))
}

async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ImageResponse>> {
    fetch_employee(&state.db.pool, &id).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        if field.file_name().is_none() {
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read image: {e}")))?;

        if data.is_empty() {
            return Err(AppError::BadRequest("Image file is empty".to_string()));
        }

        let object = StorageService::employee_image_path(&id);
        let image_url = state.storage.write(&object, &data).await?;

        sqlx::query("UPDATE employees SET image_url = ?, updated_at = ? WHERE id = ?")
            .bind(&image_url)
            .bind(Utc::now().to_rfc3339())
            .bind(&id)
            .execute(&state.db.pool)
            .await?;

        return Ok(Json(ImageResponse { image_url }));
    }

    Err(AppError::BadRequest("No image file in request".to_string()))
}

async fn upload_documents(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DocumentUploadResponse>> {
    fetch_employee(&state.db.pool, &id).await?;

    let mut uploaded = Vec::new();
    let mut errors = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let file_name = match field.file_name() {
            Some(name) => name.to_string(),
            None => {
                errors.push("File field missing filename".to_string());
                continue;
            }
        };

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                errors.push(format!("Failed to read file {file_name}: {e}"));
                continue;
            }
        };

        // One document per name per employee
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM employee_documents WHERE employee_id = ? AND name = ?",
        )
        .bind(&id)
        .bind(&file_name)
        .fetch_one(&state.db.pool)
        .await?;

        if exists > 0 {
            errors.push(format!("Document {file_name} already exists"));
            continue;
        }

        let doc_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let object = StorageService::employee_document_path(&id, &file_name);
        let url = StorageService::public_url(&object);

        if let Err(e) = sqlx::query(
            "INSERT INTO employee_documents (id, employee_id, name, url, size, content_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc_id)
        .bind(&id)
        .bind(&file_name)
        .bind(&url)
        .bind(data.len() as i64)
        .bind(&content_type)
        .bind(&now)
        .execute(&state.db.pool)
        .await
        {
            errors.push(format!("Failed to create document record {file_name}: {e}"));
            continue;
        }

        if let Err(e) = state.storage.write(&object, &data).await {
            errors.push(format!("Failed to write file {file_name}: {e}"));
            // Clean up the database entry
            let _ = sqlx::query("DELETE FROM employee_documents WHERE id = ?")
                .bind(&doc_id)
                .execute(&state.db.pool)
                .await;
            continue;
        }

        match sqlx::query_as::<_, EmployeeDocument>(
            "SELECT id, employee_id, name, url, size, content_type, created_at
             FROM employee_documents WHERE id = ?",
        )
        .bind(&doc_id)
        .fetch_one(&state.db.pool)
        .await
        {
            Ok(doc) => uploaded.push(doc),
            Err(e) => errors.push(format!("Failed to read back document {file_name}: {e}")),
        }
    }

    Ok(Json(DocumentUploadResponse { uploaded, errors }))
}

async fn delete_document(
    State(state): State<AppState>,
    Path((id, doc_id)): Path<(String, String)>,
) -> Result<Json<()>> {
    let doc = sqlx::query_as::<_, EmployeeDocument>(
        "SELECT id, employee_id, name, url, size, content_type, created_at
         FROM employee_documents WHERE id = ? AND employee_id = ?",
    )
    .bind(&doc_id)
    .bind(&id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

    let object = doc.url.trim_start_matches("/storage/").to_string();
    state.storage.delete(&object).await?;

    sqlx::query("DELETE FROM employee_documents WHERE id = ?")
        .bind(&doc_id)
        .execute(&state.db.pool)
        .await?;

    Ok(Json(()))
}

async fn issue_qr_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QrCodeResponse>> {
    let employee = fetch_employee(&state.db.pool, &id).await?;

    // Explicit re-issue surfaces failures, unlike the create flow
    let qr_code_url = state.qr.issue_for_employee(&id, &employee.name).await?;

    sqlx::query("UPDATE employees SET qr_code_url = ?, updated_at = ? WHERE id = ?")
        .bind(&qr_code_url)
        .bind(Utc::now().to_rfc3339())
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    Ok(Json(QrCodeResponse { qr_code_url }))
}
