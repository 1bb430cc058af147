/*
 * Responsibility
 * - 認証済みユーザー向け response DTO (verify / user info / profile)
 * - user_id / session_id は claims に無ければ null
 */
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub verified: bool,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub profile_data: ProfileData,
}

#[derive(Debug, Serialize)]
pub struct ProfileData {
    pub bio: &'static str,
    pub location: &'static str,
    pub joined: &'static str,
}
