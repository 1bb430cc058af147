/*
 * Responsibility
 * - `Authorization` ヘッダ値から Bearer トークンを取り出す
 * - prefix は必須 (無ければ MalformedHeader)。scheme の大小文字は区別する
 */
use super::error::AuthError;

pub const BEARER_PREFIX: &str = "Bearer ";

/// Strip the mandatory `"Bearer "` prefix and return the raw token.
pub fn extract_bearer(header_value: Option<&str>) -> Result<&str, AuthError> {
    let token = header_value
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .ok_or_else(AuthError::malformed_header)?;

    if token.trim().is_empty() {
        return Err(AuthError::malformed_header());
    }

    Ok(token)
}
