//! access token（Appwrite JWT）検証 → AuthCtx を extensions に入れる
//!
//! - `Authorization: Bearer <jwt>` を TokenVerifier に渡す (JWKS 署名検証 + aud + exp)
//! - 失敗は種類に関係なく 401 `{"detail": ...}`
//! - 成功時は Claims を AuthCtx として handler に渡す

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::state::AppState;

/// 保護したい Router に認証を掛ける。
///
/// `route_layer` なので、未定義パスは 401 ではなく 404 のまま。
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    // 分類済みの失敗ログは verifier 側で出している
    let claims = state.verifier.verify(header_value).await.into_result()?;

    if let Some(user_id) = claims.user_id() {
        tracing::debug!(user_id, "request authenticated");
    }

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(AuthCtx::new(claims));

    Ok(next.run(req).await)
}
