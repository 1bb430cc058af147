/*
 * Responsibility
 * - 環境変数や設定の読み込み (APPWRITE_*, JWKS_*, CORS 許可など)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - TokenVerifier に渡す VerifierConfig / KeyCachePolicy の組み立て
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::services::auth::VerifierConfig;
use crate::services::auth::verifier::default_key_timeout;
use crate::services::auth::jwks::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_MIN_REFETCH_INTERVAL, DEFAULT_REFRESH_INTERVAL, KeyCachePolicy,
};

const DEFAULT_APPWRITE_ENDPOINT: &str = "https://cloud.appwrite.io/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub request_timeout: Duration,

    pub appwrite_endpoint: Url,
    pub project_id: String,

    pub jwks_url: Url,
    pub jwks_refresh_interval: Duration,
    pub jwks_min_refetch_interval: Duration,
    pub jwks_fetch_timeout: Duration,
    pub auth_leeway_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match lookup("PORT") {
            Some(s) => s.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 8000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let request_timeout = seconds(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?;
        if request_timeout.is_zero() {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"));
        }

        let endpoint = lookup("APPWRITE_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_APPWRITE_ENDPOINT.to_string());
        let appwrite_endpoint =
            Url::parse(endpoint.trim()).map_err(|_| ConfigError::Invalid("APPWRITE_ENDPOINT"))?;

        let project_id = lookup("APPWRITE_PROJECT_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("APPWRITE_PROJECT_ID"))?;

        let jwks_url = match lookup("JWKS_URL") {
            Some(raw) => Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid("JWKS_URL"))?,
            None => default_jwks_url(&appwrite_endpoint, &project_id)?,
        };

        let jwks_refresh_interval = seconds(
            &lookup,
            "JWKS_REFRESH_SECONDS",
            DEFAULT_REFRESH_INTERVAL.as_secs(),
        )?;
        let jwks_min_refetch_interval = seconds(
            &lookup,
            "JWKS_MIN_REFETCH_SECONDS",
            DEFAULT_MIN_REFETCH_INTERVAL.as_secs(),
        )?;
        let jwks_fetch_timeout = seconds(
            &lookup,
            "JWKS_TIMEOUT_SECONDS",
            DEFAULT_FETCH_TIMEOUT.as_secs(),
        )?;
        if jwks_fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid("JWKS_TIMEOUT_SECONDS"));
        }

        let auth_leeway_seconds = seconds(&lookup, "AUTH_LEEWAY_SECONDS", 0)?.as_secs();

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            request_timeout,
            appwrite_endpoint,
            project_id,
            jwks_url,
            jwks_refresh_interval,
            jwks_min_refetch_interval,
            jwks_fetch_timeout,
            auth_leeway_seconds,
        })
    }

    /// The project id doubles as the expected `aud`.
    ///
    /// Key lookup must finish well inside the request timeout so that a slow provider
    /// still produces a 401 rather than a 408.
    pub fn verifier_config(&self) -> VerifierConfig {
        let mut config = VerifierConfig::new(self.jwks_url.clone(), self.project_id.clone());
        config.leeway_seconds = self.auth_leeway_seconds;
        config.key_timeout =
            default_key_timeout(self.jwks_fetch_timeout).min(self.request_timeout * 4 / 5);
        config
    }

    pub fn key_cache_policy(&self) -> KeyCachePolicy {
        KeyCachePolicy {
            refresh_interval: self.jwks_refresh_interval,
            min_refetch_interval: self.jwks_min_refetch_interval,
        }
    }
}

fn default_jwks_url(endpoint: &Url, project_id: &str) -> Result<Url, ConfigError> {
    let base = endpoint.as_str().trim_end_matches('/');
    Url::parse(&format!("{}/jwks/{}", base, project_id))
        .map_err(|_| ConfigError::Invalid("APPWRITE_PROJECT_ID"))
}

fn seconds<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid(key)),
        None => Ok(Duration::from_secs(default)),
    }
}
