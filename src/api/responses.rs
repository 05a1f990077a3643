//! API response structures

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{
    error::AppError,
    state::{CategoryGroup, CompletedTimerRecord, Notice, TimerView},
};

/// API response structure for intent endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Create a new API response
    pub fn new(status: &str, message: impl Into<String>, data: T) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// The intent took effect
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new("ok", message, data)
    }

    /// The intent was accepted but had nothing to work on
    pub fn no_data(message: impl Into<String>, data: T) -> Self {
        Self::new("no_data", message, data)
    }

    /// The intent was valid but left the state as it was
    pub fn no_change(message: impl Into<String>, data: T) -> Self {
        Self::new("no_change", message, data)
    }
}

/// Timers grouped by category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimersResponse {
    pub groups: Vec<CategoryGroup<TimerView>>,
    pub running: usize,
}

/// Result of a category-wide action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResult {
    pub category: String,
    pub action: String,
    pub changed: usize,
}

/// Categories offered when adding a timer, and those in use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub predefined: Vec<String>,
    pub in_use: Vec<String>,
}

/// Filtered history view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub category: String,
    pub records: Vec<CompletedTimerRecord>,
}

/// Enhanced status response with countdown information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timers: usize,
    pub running: usize,
    pub countdown_armed: bool,
    pub history: usize,
    pub notices: Vec<Notice>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Handler error: a core error or a malformed request
#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    BadRequest(String),
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError::App(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::App(e) => match e {
                AppError::Validation(_) => StatusCode::BAD_REQUEST,
                AppError::TimerNotFound(_) => StatusCode::NOT_FOUND,
                AppError::Permission { .. } => StatusCode::FORBIDDEN,
                AppError::StorageRead { .. }
                | AppError::StorageWrite { .. }
                | AppError::Parse { .. }
                | AppError::Export { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::App(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();

        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            warn!("Request rejected: {}", message);
        }

        let body = ErrorBody {
            status: "error".to_string(),
            message,
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}
