/*
 * Responsibility
 * - Authorization ヘッダ → Bearer 抽出 → JWT 検証 → Claims
 * - 署名鍵は KeyCache (JWKS) から kid で解決する
 * - jsonwebtoken / reqwest のエラーは AuthErrorKind に分類し直して返す
 *
 * Check order
 * 1. "Bearer " prefix (MalformedHeader)
 * 2. unverified header: structure, alg, kid (MalformedToken / SignatureInvalid)
 * 3. key lookup, bounded by key_timeout (KeyResolutionFailed)
 * 4. signature (SignatureInvalid)
 * 5. aud (AudienceMismatch)
 * 6. exp against the injected clock (Expired)
 */
use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use jsonwebtoken::{Algorithm, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;
use url::Url;

use super::bearer::extract_bearer;
use super::clock::Clock;
use super::error::{AuthError, AuthErrorKind};
use super::jwks::{DEFAULT_FETCH_TIMEOUT, KeyCache};

/// Immutable settings injected into the verifier at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub jwks_url: Url,
    pub audience: String,
    pub algorithm: Algorithm,
    pub leeway_seconds: u64,
    /// Upper bound on key lookup, including any JWKS fetch and its retry.
    pub key_timeout: Duration,
}

impl VerifierConfig {
    pub fn new(jwks_url: Url, audience: impl Into<String>) -> Self {
        Self {
            jwks_url,
            audience: audience.into(),
            algorithm: Algorithm::RS256,
            leeway_seconds: 0,
            key_timeout: default_key_timeout(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

/// Two fetch attempts plus a second of slack.
pub fn default_key_timeout(fetch_timeout: Duration) -> Duration {
    fetch_timeout * 2 + Duration::from_secs(1)
}

/// Decoded payload of a verified token.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get_str("userId")
    }

    pub fn session_id(&self) -> Option<&str> {
        self.get_str("sessionId")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Verified(Claims),
    Rejected {
        kind: AuthErrorKind,
        message: String,
    },
}

impl AuthOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    pub fn into_result(self) -> Result<Claims, AuthError> {
        match self {
            Self::Verified(claims) => Ok(claims),
            Self::Rejected { kind, message } => Err(AuthError::new(kind, message)),
        }
    }
}

impl From<Result<Claims, AuthError>> for AuthOutcome {
    fn from(result: Result<Claims, AuthError>) -> Self {
        match result {
            Ok(claims) => Self::Verified(claims),
            Err(AuthError { kind, message }) => Self::Rejected { kind, message },
        }
    }
}

/// Verifies provider-issued JWTs against the provider's published key set.
pub struct TokenVerifier {
    config: VerifierConfig,
    keys: KeyCache,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("config", &self.config)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(config: VerifierConfig, keys: KeyCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            keys,
            clock,
        }
    }

    /// Verify a raw `Authorization` header value.
    ///
    /// This is the entry-point for middleware/handlers.
    pub async fn verify(&self, header_value: Option<&str>) -> AuthOutcome {
        let result = match extract_bearer(header_value) {
            Ok(token) => self.verify_token(token).await,
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            tracing::warn!(kind = %err.kind, error = %err, "token verification failed");
        }

        result.into()
    }

    /// Verify a bare compact-serialized JWT.
    #[instrument(skip_all)]
    pub async fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let header = jsonwebtoken::decode_header(token).map_err(AuthError::malformed_token)?;

        // Never fall back to whatever the token declares.
        if header.alg != self.config.algorithm {
            tracing::debug!(alg = ?header.alg, "unexpected token algorithm");
            return Err(AuthError::signature_invalid());
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthError::malformed_token("missing 'kid' header"))?;

        let lookup = tokio::time::timeout(self.config.key_timeout, self.keys.get_key(&kid));
        let jwk = match lookup.await {
            Ok(Ok(jwk)) => jwk,
            Ok(Err(err)) => {
                tracing::warn!(kid = %kid, error = %err, "signing key resolution failed");
                return Err(AuthError::key_resolution_failed());
            }
            Err(_) => {
                tracing::warn!(
                    kid = %kid,
                    timeout = ?self.config.key_timeout,
                    "signing key resolution timed out"
                );
                return Err(AuthError::key_resolution_failed());
            }
        };

        if let Some(alg) = jwk.alg.as_deref()
            && Algorithm::from_str(alg).ok() != Some(self.config.algorithm)
        {
            tracing::warn!(kid = %kid, alg, "jwk is published for a different algorithm");
            return Err(AuthError::key_resolution_failed());
        }

        let decoding_key = jwk.to_decoding_key().map_err(|err| {
            tracing::warn!(kid = %kid, error = %err, "invalid jwk key material");
            AuthError::key_resolution_failed()
        })?;

        let data = jsonwebtoken::decode::<Claims>(token, &decoding_key, &self.validation())
            .map_err(classify_jwt_error)?;
        let claims = data.claims;

        self.check_expiry(&claims)?;

        tracing::debug!("token verified");
        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.config.algorithm);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        // exp is checked after aud, against the injected clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation
    }

    fn check_expiry(&self, claims: &Claims) -> Result<(), AuthError> {
        let exp = claims
            .get("exp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .ok_or_else(|| AuthError::malformed_token("'exp' claim is not a number"))?;

        let leeway = i64::try_from(self.config.leeway_seconds).unwrap_or(i64::MAX);
        let now = self.clock.now().timestamp();

        if exp <= now.saturating_sub(leeway) {
            return Err(AuthError::expired());
        }
        Ok(())
    }
}

fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            AuthError::signature_invalid()
        }
        ErrorKind::InvalidAudience => AuthError::audience_mismatch(),
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => {
            AuthError::audience_mismatch()
        }
        ErrorKind::ExpiredSignature => AuthError::expired(),
        ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
            AuthError::key_resolution_failed()
        }
        _ => AuthError::malformed_token(&err),
    }
}
