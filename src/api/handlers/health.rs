/*
 * Responsibility
 * - GET / (疎通用, 認証なし)
 */
use axum::Json;
use chrono::Utc;

use crate::api::dto::health::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online",
        message: "Auth Backend API is running",
        timestamp: Utc::now(),
    })
}
