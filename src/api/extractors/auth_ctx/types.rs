/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - JWT / JWKS の検証ロジックは services::auth 側の責務
 * - userId / sessionId は発行元が省略し得るので Option (レスポンスでは null)
 */
use crate::services::auth::Claims;

/// 認証済みのリクエストに付与されるコンテキスト
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub claims: Claims,
}

impl AuthCtx {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> Option<String> {
        self.claims.user_id().map(str::to_owned)
    }

    pub fn session_id(&self) -> Option<String> {
        self.claims.session_id().map(str::to_owned)
    }
}
