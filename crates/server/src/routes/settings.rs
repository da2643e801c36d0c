use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::models::PinSetting,
    error::{AppError, Result},
    AppState,
};

const ACCESS_PIN: &str = "access_pin";
const DEFAULT_PIN: &str = "1234";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pin", get(get_pin).put(set_pin))
        .route("/pin/history", get(pin_history))
}

#[derive(Debug, Deserialize)]
pub struct SetPinRequest {
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct PinResponse {
    pub pin: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PinHistoryResponse {
    pub pins: Vec<PinResponse>,
}

impl From<PinSetting> for PinResponse {
    fn from(row: PinSetting) -> Self {
        Self {
            pin: row.pin,
            created_at: row.created_at,
        }
    }
}

fn is_valid_pin(pin: &str) -> bool {
    pin.len() == 4 && pin.chars().all(|c| c.is_ascii_digit())
}

/// The PIN in effect is the most recently created one; older rows stay
/// around as history. An empty table lazily seeds the default.
pub(crate) async fn current_pin(pool: &SqlitePool) -> Result<PinSetting> {
    let existing = sqlx::query_as::<_, PinSetting>(
        "SELECT id, setting_type, pin, created_at FROM system_settings
         WHERE setting_type = ? ORDER BY created_at DESC, id LIMIT 1",
    )
    .bind(ACCESS_PIN)
    .fetch_optional(pool)
    .await?;

    if let Some(setting) = existing {
        return Ok(setting);
    }

    insert_pin(pool, DEFAULT_PIN).await
}

async fn insert_pin(pool: &SqlitePool, pin: &str) -> Result<PinSetting> {
    let setting_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO system_settings (id, setting_type, pin, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&setting_id)
    .bind(ACCESS_PIN)
    .bind(pin)
    .bind(&now)
    .execute(pool)
    .await?;

    let setting = sqlx::query_as::<_, PinSetting>(
        "SELECT id, setting_type, pin, created_at FROM system_settings WHERE id = ?",
    )
    .bind(&setting_id)
    .fetch_one(pool)
    .await?;

    Ok(setting)
}

async fn get_pin(State(state): State<AppState>) -> Result<Json<PinResponse>> {
    let setting = current_pin(&state.db.pool).await?;
    Ok(Json(setting.into()))
}

async fn set_pin(
    State(state): State<AppState>,
    Json(body): Json<SetPinRequest>,
) -> Result<Json<PinResponse>> {
    if !is_valid_pin(&body.pin) {
        return Err(AppError::Validation(
            "PIN must be exactly 4 digits".to_string(),
        ));
    }

    let setting = insert_pin(&state.db.pool, &body.pin).await?;
    Ok(Json(setting.into()))
}

async fn pin_history(State(state): State<AppState>) -> Result<Json<PinHistoryResponse>> {
    let pins = sqlx::query_as::<_, PinSetting>(
        "SELECT id, setting_type, pin, created_at FROM system_settings
         WHERE setting_type = ? ORDER BY created_at DESC, id",
    )
    .bind(ACCESS_PIN)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(PinHistoryResponse {
        pins: pins.into_iter().map(PinResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_validation_requires_exactly_four_digits() {
        assert!(is_valid_pin("1234"));
        assert!(is_valid_pin("0000"));
        assert!(!is_valid_pin("12ab"));
        assert!(!is_valid_pin("123"));
        assert!(!is_valid_pin("12345"));
        assert!(!is_valid_pin(""));
        assert!(!is_valid_pin("12 4"));
        // Non-ASCII digits don't count
        assert!(!is_valid_pin("１２３４"));
    }
}
