//! Shared fixtures: RSA signing keys, token minting, a mocked JWKS endpoint and a
//! manually driven clock.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use auth_backend::services::auth::clock::{Clock, SystemClock};
use auth_backend::services::auth::jwks::{HttpKeyFetcher, KeyCache, KeyCachePolicy};
use auth_backend::services::auth::{TokenVerifier, VerifierConfig};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROJECT_ID: &str = "project-123";
pub const KID: &str = "abc";
pub const JWKS_PATH: &str = "/v1/jwks/project-123";

const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");
const JWKS_JSON: &str = include_str!("../fixtures/jwks.json");

pub fn jwks() -> Value {
    serde_json::from_str(JWKS_JSON).expect("fixture jwks.json is valid json")
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Appwrite-style payload expiring `exp_in` seconds from now.
pub fn claims(exp_in: i64) -> Value {
    json!({
        "userId": "u1",
        "sessionId": "s1",
        "aud": PROJECT_ID,
        "iat": now(),
        "exp": now() + exp_in,
    })
}

fn sign_with(payload: &Value, kid: Option<&str>, pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture pem is a valid rsa key");
    jsonwebtoken::encode(&header, payload, &key).expect("token signs")
}

/// Token signed by the key published under `kid=abc`.
pub fn sign(payload: &Value) -> String {
    sign_with(payload, Some(KID), SIGNING_KEY_PEM)
}

pub fn sign_with_kid(payload: &Value, kid: Option<&str>) -> String {
    sign_with(payload, kid, SIGNING_KEY_PEM)
}

/// Token claiming `kid=abc` but signed by a key the provider never published.
pub fn sign_with_rogue_key(payload: &Value) -> String {
    sign_with(payload, Some(KID), ROGUE_KEY_PEM)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// JWKS endpoint serving the fixture key set; expects `fetches` requests when set.
pub async fn jwks_server(fetches: Option<u64>) -> MockServer {
    let server = MockServer::start().await;
    let mock = Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks()));
    let mock = match fetches {
        Some(n) => mock.expect(n),
        None => mock,
    };
    mock.mount(&server).await;
    server
}

pub fn jwks_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}{}", server.uri(), JWKS_PATH)).expect("mock server url")
}

pub fn verifier_with(
    jwks_url: Url,
    clock: Arc<dyn Clock>,
    leeway_seconds: u64,
) -> TokenVerifier {
    let mut config = VerifierConfig::new(jwks_url, PROJECT_ID);
    config.leeway_seconds = leeway_seconds;
    verifier_from(config, clock)
}

/// Verifier whose key lookup gives up after `key_timeout`.
pub fn verifier_with_key_timeout(server: &MockServer, key_timeout: Duration) -> TokenVerifier {
    let mut config = VerifierConfig::new(jwks_url(server), PROJECT_ID);
    config.key_timeout = key_timeout;
    verifier_from(config, Arc::new(SystemClock))
}

fn verifier_from(config: VerifierConfig, clock: Arc<dyn Clock>) -> TokenVerifier {
    let fetcher =
        HttpKeyFetcher::new(config.jwks_url.clone(), Duration::from_secs(2)).expect("http client");
    let keys = KeyCache::new(Arc::new(fetcher), clock.clone(), KeyCachePolicy::default());
    TokenVerifier::new(config, keys, clock)
}

pub fn verifier(server: &MockServer) -> TokenVerifier {
    verifier_with(jwks_url(server), Arc::new(SystemClock), 0)
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc::now()))
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.0.lock().expect("clock lock");
        *now += TimeDelta::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock lock")
    }
}
