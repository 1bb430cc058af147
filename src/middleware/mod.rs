/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth (Bearer 検証), cors, http (request-id / trace / timeout / body limit)
 */
pub mod auth;
pub mod cors;
pub mod http;
