/*
 * Responsibility
 * - URL 構造を定義
 * - GET / は公開、/api 配下は Bearer 必須 (middleware::auth::access)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{
    dashboard::dashboard,
    health::health,
    session::{profile, user_info, verify_token},
};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/verify", post(verify_token))
        .route("/user/info", get(user_info))
        .route("/dashboard", get(dashboard))
        .route("/profile", get(profile));

    let protected = middleware::auth::access::apply(protected, state);

    Router::new()
        .route("/", get(health))
        .nest("/api", protected)
}
