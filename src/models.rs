use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Roles ---

/// UserRole
///
/// The RBAC field. Stored as lowercase text in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UserRole {
    Admin,
    #[default]
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Student => "student",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "student" => Ok(UserRole::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `users` table. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub is_active: bool,
    #[serde(skip)]
    pub hashed_password: String,
    #[ts(type = "string | null")]
    pub created_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub last_login: Option<DateTime<Utc>>,
    // Used by the recommendation feed.
    pub preferred_categories: Vec<String>,
    // Students only.
    pub matric_number: Option<String>,
    pub department: Option<String>,
    pub level: Option<String>,
    // Admin/staff only.
    pub staff_id: Option<String>,
}

/// News
///
/// A row of the `news` table. `category` and `confidence_score` are written by
/// the classifier on creation and on content updates.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct News {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
    // Admin who published the article.
    pub created_by: Option<Uuid>,
    pub views_count: i64,
    pub likes_count: i64,
    pub is_featured: bool,
    pub is_active: bool,
    pub confidence_score: Option<f64>,
}

/// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// `username` carries the user's email.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// RegisterRequest
///
/// Lightweight self-registration (POST /auth/register).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub role: UserRole,
}

/// CreateUserRequest
///
/// Full profile creation (POST /users). Students must provide a matric number
/// and admins a staff id.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub matric_number: Option<String>,
    pub department: Option<String>,
    pub staff_id: Option<String>,
}

fn default_true() -> bool {
    true
}

/// NewUser
///
/// Insert payload handed to the repository once the password has been hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub hashed_password: String,
    pub matric_number: Option<String>,
    pub department: Option<String>,
    pub staff_id: Option<String>,
}

/// CreateNewsRequest
///
/// Input payload for POST /news. A client-supplied `category` is ignored;
/// the classifier decides it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateNewsRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// NewNews
///
/// Insert payload: the request plus the author and the classification outcome.
#[derive(Debug, Clone, Default)]
pub struct NewNews {
    pub title: String,
    pub content: String,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub created_by: Uuid,
    pub category: String,
    pub confidence_score: f64,
}

/// UpdateNewsRequest
///
/// Partial update payload (PUT /news/{id}). Only `Some` fields are written.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateNewsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// NewsFilter
///
/// Query parameters for the public listing (GET /news).
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct NewsFilter {
    pub category: Option<String>,
    /// Case-insensitive match against title and content.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Page size, 1..=100.
    pub limit: Option<i64>,
}

/// RecommendedFilter
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct RecommendedFilter {
    /// Number of articles, 1..=20.
    pub limit: Option<i64>,
}

/// --- Output Schemas ---

/// NewsPage
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewsPage {
    pub items: Vec<News>,
    pub total: i64,
}

/// UserSummary
///
/// The user block embedded in token responses.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }
}

/// TokenResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PreferencesResponse {
    pub preferred_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DepartmentResponse {
    pub department: Option<String>,
}

/// MessageResponse
///
/// Plain acknowledgement body for actions without a resource to return.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
