use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::models::User,
    error::{AppError, Result},
    middleware::auth::AuthUser,
    routes::auth::hash_password,
    services::storage::StorageService,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:uid",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/:uid/image", post(upload_image))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Option<String>,
    pub employee_id: Option<String>,
    pub pin: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub employee_id: Option<String>,
    pub pin: Option<String>,
    pub activity: Option<String>,
    pub unlocked_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub image_url: String,
}

const USER_SELECT: &str =
    "SELECT id, email, name, password_hash, role, employee_id, pin, activity, unlocked_by, created_at FROM users";

async fn fetch_user(pool: &sqlx::SqlitePool, uid: &str) -> Result<User> {
    sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE id = ?"))
        .bind(uid)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

async fn email_taken(pool: &sqlx::SqlitePool, email: &str, except_uid: Option<&str>) -> Result<bool> {
    let count = match except_uid {
        Some(uid) => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(uid)
                .fetch_one(pool)
                .await?
        }
        None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await?,
    };

    Ok(count > 0)
}

async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>> {
    let users = sqlx::query_as::<_, User>(&format!("{USER_SELECT} ORDER BY created_at DESC"))
        .fetch_all(&state.db.pool)
        .await?;

    Ok(Json(UserListResponse { users }))
}

async fn create_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    validate_email(&body.email)?;

    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if body.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    if email_taken(&state.db.pool, &body.email, None).await? {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(&body.password)?;
    let user_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let role = body.role.unwrap_or_else(|| "user".to_string());

    sqlx::query(
        "INSERT INTO users (id, email, name, password_hash, role, employee_id, pin, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user_id)
    .bind(&body.email)
    .bind(&body.name)
    .bind(&password_hash)
    .bind(&role)
    .bind(&body.employee_id)
    .bind(&body.pin)
    .bind(&now)
    .execute(&state.db.pool)
    .await?;

    let user = fetch_user(&state.db.pool, &user_id).await?;

    tracing::info!("User {} created by {}", user.email, admin.email);

    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<User>> {
    let user = fetch_user(&state.db.pool, &uid).await?;
    Ok(Json(user))
}

async fn update_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    let mut user = fetch_user(&state.db.pool, &uid).await?;

    if let Some(email) = body.email {
        validate_email(&email)?;
        if email_taken(&state.db.pool, &email, Some(&uid)).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        user.email = email;
    }
    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        user.name = name;
    }
    if let Some(password) = body.password {
        if password.len() < 8 {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        user.password_hash = hash_password(&password)?;
    }
    if let Some(role) = body.role {
        user.role = role;
    }
    if body.employee_id.is_some() {
        user.employee_id = body.employee_id;
    }
    if body.pin.is_some() {
        user.pin = body.pin;
    }
    if body.activity.is_some() {
        user.activity = body.activity;
    }
    if body.unlocked_by.is_some() {
        user.unlocked_by = body.unlocked_by;
    }

    sqlx::query(
        "UPDATE users SET email = ?, name = ?, password_hash = ?, role = ?, employee_id = ?, pin = ?, activity = ?, unlocked_by = ?
         WHERE id = ?",
    )
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(&user.employee_id)
    .bind(&user.pin)
    .bind(&user.activity)
    .bind(&user.unlocked_by)
    .bind(&uid)
    .execute(&state.db.pool)
    .await?;

    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<()>> {
    fetch_user(&state.db.pool, &uid).await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&uid)
        .execute(&state.db.pool)
        .await?;

    if let Err(e) = state.storage.delete_prefix(&format!("users/{uid}")).await {
        tracing::warn!("Failed to remove storage for user {uid}: {e}");
    }

    Ok(Json(()))
}

async fn upload_image(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ImageResponse>> {
    fetch_user(&state.db.pool, &uid).await?;

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

        let object = StorageService::user_image_path(&uid);
        let image_url = state.storage.write(&object, &data).await?;

        return Ok(Json(ImageResponse { image_url }));
    }

    Err(AppError::BadRequest("No image file in request".to_string()))
}
