use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user_id: Option<String>,
    pub total_users: u64,
    pub active_sessions: u64,
    pub api_calls: u64,
    pub message: &'static str,
    pub last_updated: DateTime<Utc>,
}
