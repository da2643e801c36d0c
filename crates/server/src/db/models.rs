use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub employee_id: Option<String>,
    pub pin: Option<String>,
    pub activity: Option<String>,
    pub unlocked_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Read model for employees; `build_site_name` comes from a LEFT JOIN on
/// `build_sites`, so a deleted site reads back as NULL rather than a stale
/// name.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub firm: Option<String>,
    pub birthdate: Option<String>,
    pub build_site_id: Option<String>,
    pub build_site_name: Option<String>,
    pub role: Option<String>,
    pub image_url: Option<String>,
    pub notes: Option<String>,
    pub rating: Option<i64>,
    pub qr_code_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmployeeDocument {
    pub id: String,
    pub employee_id: String,
    pub name: String,
    pub url: String,
    pub size: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BuildSite {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// `screenshots` holds a JSON array of URLs; routes decode it before
// serializing a response.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feedback {
    pub id: String,
    pub message: String,
    pub email: Option<String>,
    pub url: Option<String>,
    pub viewport: Option<String>,
    pub screenshots: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackStatus {
    New,
    InProgress,
    NeedDetails,
    Urgent,
    Completed,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::New => "new",
            FeedbackStatus::InProgress => "in-progress",
            FeedbackStatus::NeedDetails => "need-details",
            FeedbackStatus::Urgent => "urgent",
            FeedbackStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(FeedbackStatus::New),
            "in-progress" => Some(FeedbackStatus::InProgress),
            "need-details" => Some(FeedbackStatus::NeedDetails),
            "urgent" => Some(FeedbackStatus::Urgent),
            "completed" => Some(FeedbackStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Consultation {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PinSetting {
    pub id: String,
    pub setting_type: String,
    pub pin: String,
    pub created_at: DateTime<Utc>,
}
