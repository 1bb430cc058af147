//! JWKS fetching and caching.
//!
//! The identity provider publishes its RSA signing keys at `<endpoint>/jwks/<project>`.
//! `KeyCache` keeps an immutable snapshot of that key set and swaps it on refresh:
//! - snapshot older than `refresh_interval` => refetch before answering
//! - unknown `kid` on a fresh snapshot => refetch (provider key rotation), but at most
//!   once per `min_refetch_interval`
//! - fetch failures are never served from a stale snapshot, and are remembered for
//!   `min_refetch_interval` so a failing provider sees one request per window
//!
//! The fetcher and the clock are injected so the cache can be driven in tests without
//! network access or real time.
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;
use url::Url;

use super::clock::Clock;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A single JSON Web Key as published by the provider.
///
/// Only RSA keys are usable; other key types are kept so that a lookup by `kid` can
/// report "wrong key material" instead of "unknown key".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    // RSA modulus / exponent (base64url, no padding)
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

impl Jwk {
    /// Build an RSA verification key from `n`/`e`.
    pub fn to_decoding_key(&self) -> Result<DecodingKey, KeyMaterialError> {
        if self.kty != "RSA" {
            return Err(KeyMaterialError::UnsupportedKeyType(self.kty.clone()));
        }
        let n = self
            .n
            .as_deref()
            .ok_or(KeyMaterialError::MissingComponent("n"))?;
        let e = self
            .e
            .as_deref()
            .ok_or(KeyMaterialError::MissingComponent("e"))?;

        DecodingKey::from_rsa_components(n, e).map_err(KeyMaterialError::Invalid)
    }

    fn is_signing_key(&self) -> bool {
        // `use` is optional in RFC 7517; only an explicit "enc" disqualifies a key.
        !matches!(self.key_use.as_deref(), Some("enc"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Error)]
pub enum KeyMaterialError {
    #[error("unsupported key type '{0}'")]
    UnsupportedKeyType(String),
    #[error("missing '{0}' component")]
    MissingComponent(&'static str),
    #[error("invalid rsa components: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// Failures while talking to the JWKS endpoint.
#[derive(Debug, Error)]
pub enum KeyFetchError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("jwks request failed: {0}")]
    Transport(reqwest::Error),
    #[error("jwks endpoint returned {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid jwks document: {0}")]
    Decode(reqwest::Error),
}

impl KeyFetchError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Why a key could not be handed to the verifier.
#[derive(Debug, Error)]
pub enum KeyResolutionError {
    #[error(transparent)]
    Fetch(#[from] KeyFetchError),
    #[error("no key with kid '{0}' in the key set")]
    UnknownKid(String),
    #[error("jwks fetch failed recently: {0}")]
    RecentFailure(String),
}

/// Source of the provider's key set.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError>;
}

/// Fetches the key set over HTTP(S).
///
/// One retry is made when the first attempt fails at the transport level
/// (connect error or timeout). HTTP error statuses and bad bodies are not retried.
#[derive(Debug, Clone)]
pub struct HttpKeyFetcher {
    url: Url,
    client: reqwest::Client,
}

impl HttpKeyFetcher {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, KeyFetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(KeyFetchError::Client)?;

        Ok(Self { url, client })
    }

    async fn fetch_once(&self) -> Result<JwkSet, KeyFetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(KeyFetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyFetchError::Status(status));
        }

        response.json::<JwkSet>().await.map_err(KeyFetchError::Decode)
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError> {
        match self.fetch_once().await {
            Err(err) if err.is_transient() => {
                tracing::warn!(error = %err, "jwks fetch failed, retrying once");
                self.fetch_once().await
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCachePolicy {
    pub refresh_interval: Duration,
    pub min_refetch_interval: Duration,
}

impl Default for KeyCachePolicy {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            min_refetch_interval: DEFAULT_MIN_REFETCH_INTERVAL,
        }
    }
}

struct KeySnapshot {
    keys: HashMap<String, Jwk>,
    fetched_at: DateTime<Utc>,
}

impl KeySnapshot {
    fn age(&self, now: DateTime<Utc>) -> Duration {
        // A clock that moved backwards counts as "just fetched".
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }
}

struct FailedFetch {
    at: DateTime<Utc>,
    reason: String,
}

impl FailedFetch {
    fn to_error(&self) -> KeyResolutionError {
        KeyResolutionError::RecentFailure(self.reason.clone())
    }
}

/// Shared, refreshable view of the provider's signing keys.
pub struct KeyCache {
    fetcher: Arc<dyn KeyFetcher>,
    clock: Arc<dyn Clock>,
    policy: KeyCachePolicy,
    snapshot: RwLock<Option<Arc<KeySnapshot>>>,
    // Completed fetch attempts, successful or not. Only bumped under `refresh_lock`.
    attempts: AtomicU64,
    // Serializes refreshes so concurrent misses trigger a single fetch.
    // Holds the last failed attempt until a fetch succeeds.
    refresh_lock: Mutex<Option<FailedFetch>>,
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl KeyCache {
    pub fn new(
        fetcher: Arc<dyn KeyFetcher>,
        clock: Arc<dyn Clock>,
        policy: KeyCachePolicy,
    ) -> Self {
        Self {
            fetcher,
            clock,
            policy,
            snapshot: RwLock::new(None),
            attempts: AtomicU64::new(0),
            refresh_lock: Mutex::new(None),
        }
    }

    /// Look up the key for `kid`, fetching the key set when needed.
    #[instrument(skip(self))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, KeyResolutionError> {
        let seen = self.attempts.load(Ordering::SeqCst);
        let now = self.clock.now();
        let current = self.snapshot.read().await.clone();

        if let Some(snapshot) = &current {
            let age = snapshot.age(now);
            if age < self.policy.refresh_interval {
                if let Some(jwk) = snapshot.keys.get(kid) {
                    tracing::debug!(kid, "jwks cache hit");
                    return Ok(jwk.clone());
                }
                if age < self.policy.min_refetch_interval {
                    tracing::debug!(kid, "unknown kid, refetch suppressed");
                    return Err(KeyResolutionError::UnknownKid(kid.to_string()));
                }
            }
        }

        let snapshot = self.refresh(seen).await?;

        snapshot
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| KeyResolutionError::UnknownKid(kid.to_string()))
    }

    /// Fetch the key set unless another task already did so after `seen` attempts.
    ///
    /// A failed fetch is remembered: tasks queued behind it, and any caller within
    /// `min_refetch_interval` of it, get the same failure without another request.
    async fn refresh(&self, seen: u64) -> Result<Arc<KeySnapshot>, KeyResolutionError> {
        let mut last_failure = self.refresh_lock.lock().await;

        if self.attempts.load(Ordering::SeqCst) != seen {
            if let Some(failure) = last_failure.as_ref() {
                return Err(failure.to_error());
            }
            if let Some(current) = self.snapshot.read().await.as_ref() {
                return Ok(Arc::clone(current));
            }
        }

        if let Some(failure) = last_failure.as_ref() {
            let since = (self.clock.now() - failure.at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if since < self.policy.min_refetch_interval {
                tracing::debug!("jwks fetch failed recently, refetch suppressed");
                return Err(failure.to_error());
            }
        }

        let result = self.fetcher.fetch().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let set = match result {
            Ok(set) => set,
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch jwks");
                *last_failure = Some(FailedFetch {
                    at: self.clock.now(),
                    reason: err.to_string(),
                });
                return Err(err.into());
            }
        };
        *last_failure = None;

        let keys: HashMap<String, Jwk> = set
            .keys
            .into_iter()
            .filter(Jwk::is_signing_key)
            .filter_map(|jwk| jwk.kid.clone().map(|kid| (kid, jwk)))
            .collect();

        tracing::info!(key_count = keys.len(), "jwks cache refreshed");

        let snapshot = Arc::new(KeySnapshot {
            keys,
            fetched_at: self.clock.now(),
        });
        *self.snapshot.write().await = Some(Arc::clone(&snapshot));

        Ok(snapshot)
    }
}
