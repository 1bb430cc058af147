use axum::Json;
use chrono::Utc;

use crate::api::{dto::dashboard::DashboardResponse, extractors::AuthCtxExtractor};

/// GET /api/dashboard (static sample figures)
pub async fn dashboard(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<DashboardResponse> {
    Json(DashboardResponse {
        user_id: ctx.user_id(),
        total_users: 1250,
        active_sessions: 42,
        api_calls: 8735,
        message: "Welcome to your personalized dashboard!",
        last_updated: Utc::now(),
    })
}
