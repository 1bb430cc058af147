/// Factory: build `TokenVerifier` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::services::auth::TokenVerifier;
use crate::services::auth::clock::SystemClock;
use crate::services::auth::jwks::{HttpKeyFetcher, KeyCache};

pub fn build_token_verifier(config: &Config) -> Result<Arc<TokenVerifier>, AppError> {
    let verifier_config = config.verifier_config();

    let fetcher = HttpKeyFetcher::new(verifier_config.jwks_url.clone(), config.jwks_fetch_timeout)
        .map_err(|err| {
            tracing::error!(error = %err, "failed to build jwks fetcher");
            AppError::Internal
        })?;

    let clock = Arc::new(SystemClock);
    let keys = KeyCache::new(Arc::new(fetcher), clock.clone(), config.key_cache_policy());

    tracing::info!(
        jwks_url = %verifier_config.jwks_url,
        key_timeout = ?verifier_config.key_timeout,
        "token verifier ready"
    );

    Ok(Arc::new(TokenVerifier::new(verifier_config, keys, clock)))
}
