//! API models for request and response payloads
//!
//! Task payloads are the planner's wire types; this module adds the
//! envelopes specific to the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response for session establishment
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Response for the CSRF token endpoint
#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since startup
    pub uptime: f64,
    pub environment: String,
}

/// Request for marking a scheduled task done or not done
#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub completed: bool,
}
