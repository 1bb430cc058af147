/*
 * Responsibility
 * - POST /api/auth/verify, GET /api/user/info, GET /api/profile
 * - middleware が入れた AuthCtx から user_id / session_id を返すだけ (DB なし)
 */
use axum::Json;
use chrono::Utc;

use crate::api::{
    dto::session::{ProfileData, ProfileResponse, UserInfoResponse, VerifyResponse},
    extractors::AuthCtxExtractor,
};

pub async fn verify_token(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        verified: true,
        user_id: ctx.user_id(),
        session_id: ctx.session_id(),
    })
}

pub async fn user_info(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<UserInfoResponse> {
    Json(UserInfoResponse {
        user_id: ctx.user_id(),
        session_id: ctx.session_id(),
        verified: true,
        message: "User authenticated successfully via JWT",
        timestamp: Utc::now(),
    })
}

pub async fn profile(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        user_id: ctx.user_id(),
        session_id: ctx.session_id(),
        // sample data
        profile_data: ProfileData {
            bio: "Software Developer",
            location: "San Francisco, CA",
            joined: "2024-01-15",
        },
    })
}
