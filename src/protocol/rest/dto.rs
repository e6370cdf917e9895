//! HTTP Data Transfer Objects

use serde::{Deserialize, Serialize};

/// JSON response: { success, data?, error? }
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorDto>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error details in API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDto {
    pub code: String,
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_connections: usize,
}

/// Connection statistics
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsDto {
    pub active_connections: usize,
    pub connection_ids: Vec<String>,
    pub uptime_secs: u64,
    pub shutting_down: bool,
}
