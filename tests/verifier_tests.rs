//! Token verification against a mocked JWKS endpoint.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use auth_backend::services::auth::clock::SystemClock;
use auth_backend::services::auth::{AuthErrorKind, AuthOutcome, Claims};
use serde_json::json;
use url::Url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{ManualClock, PROJECT_ID, bearer, claims, jwks_server, sign, verifier};

fn rejected_kind(outcome: AuthOutcome) -> AuthErrorKind {
    match outcome {
        AuthOutcome::Rejected { kind, .. } => kind,
        AuthOutcome::Verified(claims) => panic!("unexpectedly verified: {claims:?}"),
    }
}

fn verified(outcome: AuthOutcome) -> Claims {
    match outcome {
        AuthOutcome::Verified(claims) => claims,
        AuthOutcome::Rejected { kind, message } => panic!("rejected ({kind}): {message}"),
    }
}

#[tokio::test]
async fn valid_token_yields_its_payload() {
    let server = jwks_server(Some(1)).await;
    let verifier = verifier(&server);

    let payload = claims(3600);
    let token = sign(&payload);

    let claims = verified(verifier.verify(Some(&bearer(&token))).await);

    assert_eq!(claims.user_id(), Some("u1"));
    assert_eq!(claims.session_id(), Some("s1"));
    assert_eq!(&serde_json::to_value(&claims).unwrap(), &payload);
}

#[tokio::test]
async fn repeated_verification_is_idempotent_and_cached() {
    // One fetch for both calls.
    let server = jwks_server(Some(1)).await;
    let verifier = verifier(&server);
    let header = bearer(&sign(&claims(3600)));

    let first = verifier.verify(Some(&header)).await;
    let second = verifier.verify(Some(&header)).await;

    assert!(first.is_verified());
    assert_eq!(first, second);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let server = jwks_server(None).await;
    let verifier = verifier(&server);

    let token = sign(&claims(-10));
    let outcome = verifier.verify(Some(&bearer(&token))).await;

    assert_eq!(rejected_kind(outcome), AuthErrorKind::Expired);
}

#[tokio::test]
async fn leeway_accepts_recently_expired_token() {
    let server = jwks_server(None).await;
    let verifier = common::verifier_with(common::jwks_url(&server), Arc::new(SystemClock), 60);

    let token = sign(&claims(-10));
    assert!(verifier.verify(Some(&bearer(&token))).await.is_verified());
}

#[tokio::test]
async fn expiry_follows_the_injected_clock() {
    let server = jwks_server(None).await;
    let clock = Arc::new(ManualClock::new());
    let verifier = common::verifier_with(common::jwks_url(&server), clock.clone(), 0);

    let header = bearer(&sign(&claims(100)));
    assert!(verifier.verify(Some(&header)).await.is_verified());

    clock.advance(200);
    assert_eq!(
        rejected_kind(verifier.verify(Some(&header)).await),
        AuthErrorKind::Expired
    );
}

#[tokio::test]
async fn wrong_scheme_is_malformed_header() {
    let server = jwks_server(Some(0)).await;
    let verifier = verifier(&server);
    let token = sign(&claims(3600));

    for header in ["Token xyz".to_string(), format!("bearer {token}"), token.clone()] {
        let outcome = verifier.verify(Some(&header)).await;
        assert_eq!(rejected_kind(outcome), AuthErrorKind::MalformedHeader);
    }
    assert_eq!(
        rejected_kind(verifier.verify(None).await),
        AuthErrorKind::MalformedHeader
    );
}

#[tokio::test]
async fn audience_mismatch_is_rejected() {
    let server = jwks_server(None).await;
    let verifier = verifier(&server);

    let mut payload = claims(3600);
    payload["aud"] = json!("another-project");
    let outcome = verifier.verify(Some(&bearer(&sign(&payload)))).await;
    assert_eq!(rejected_kind(outcome), AuthErrorKind::AudienceMismatch);

    let mut payload = claims(3600);
    payload.as_object_mut().unwrap().remove("aud");
    let outcome = verifier.verify(Some(&bearer(&sign(&payload)))).await;
    assert_eq!(rejected_kind(outcome), AuthErrorKind::AudienceMismatch);
}

#[tokio::test]
async fn audience_is_checked_before_expiry() {
    let server = jwks_server(None).await;
    let verifier = verifier(&server);

    let mut payload = claims(-10);
    payload["aud"] = json!("another-project");
    let outcome = verifier.verify(Some(&bearer(&sign(&payload)))).await;

    assert_eq!(rejected_kind(outcome), AuthErrorKind::AudienceMismatch);
}

#[tokio::test]
async fn audience_array_containing_project_is_accepted() {
    let server = jwks_server(None).await;
    let verifier = verifier(&server);

    let mut payload = claims(3600);
    payload["aud"] = json!(["other", PROJECT_ID]);

    assert!(verifier.verify(Some(&bearer(&sign(&payload)))).await.is_verified());
}

#[tokio::test]
async fn unpublished_kid_fails_key_resolution() {
    let server = jwks_server(None).await;
    let verifier = verifier(&server);

    let token = common::sign_with_kid(&claims(3600), Some("not-published"));
    let outcome = verifier.verify(Some(&bearer(&token))).await;

    assert_eq!(rejected_kind(outcome), AuthErrorKind::KeyResolutionFailed);
}

#[tokio::test]
async fn missing_kid_is_malformed_token() {
    let server = jwks_server(Some(0)).await;
    let verifier = verifier(&server);

    let token = common::sign_with_kid(&claims(3600), None);
    let outcome = verifier.verify(Some(&bearer(&token))).await;

    assert_eq!(rejected_kind(outcome), AuthErrorKind::MalformedToken);
}

#[tokio::test]
async fn missing_exp_is_malformed_token() {
    let server = jwks_server(None).await;
    let verifier = verifier(&server);

    let mut payload = claims(3600);
    payload.as_object_mut().unwrap().remove("exp");
    let outcome = verifier.verify(Some(&bearer(&sign(&payload)))).await;

    assert_eq!(rejected_kind(outcome), AuthErrorKind::MalformedToken);
}

#[tokio::test]
async fn foreign_signature_is_rejected() {
    let server = jwks_server(None).await;
    let verifier = verifier(&server);

    let token = common::sign_with_rogue_key(&claims(3600));
    let outcome = verifier.verify(Some(&bearer(&token))).await;

    assert_eq!(rejected_kind(outcome), AuthErrorKind::SignatureInvalid);
}

#[tokio::test]
async fn tampered_payload_is_rejected() {
    let server = jwks_server(None).await;
    let verifier = verifier(&server);

    let original = sign(&claims(3600));
    let mut forged_claims = claims(3600);
    forged_claims["userId"] = json!("admin");
    let forged = sign(&forged_claims);

    // Keep the genuine signature, swap in the forged body.
    let original_parts: Vec<&str> = original.split('.').collect();
    let forged_parts: Vec<&str> = forged.split('.').collect();
    let token = format!(
        "{}.{}.{}",
        original_parts[0], forged_parts[1], original_parts[2]
    );

    let outcome = verifier.verify(Some(&bearer(&token))).await;
    assert_eq!(rejected_kind(outcome), AuthErrorKind::SignatureInvalid);
}

#[tokio::test]
async fn jwks_outage_fails_key_resolution() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let verifier = verifier(&server);

    let outcome = verifier.verify(Some(&bearer(&sign(&claims(3600))))).await;
    assert_eq!(rejected_kind(outcome), AuthErrorKind::KeyResolutionFailed);
}

#[tokio::test]
async fn unreachable_jwks_fails_key_resolution() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{addr}/v1/jwks/{PROJECT_ID}")).unwrap();
    let verifier = common::verifier_with(url, Arc::new(SystemClock), 0);

    let outcome = verifier.verify(Some(&bearer(&sign(&claims(3600))))).await;
    assert_eq!(rejected_kind(outcome), AuthErrorKind::KeyResolutionFailed);
}

#[tokio::test]
async fn key_published_for_another_algorithm_is_refused() {
    let server = MockServer::start().await;
    let mut jwks = common::jwks();
    jwks["keys"][0]["alg"] = json!("RS512");
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
        .mount(&server)
        .await;
    let verifier = verifier(&server);

    let outcome = verifier.verify(Some(&bearer(&sign(&claims(3600))))).await;
    assert_eq!(rejected_kind(outcome), AuthErrorKind::KeyResolutionFailed);
}

#[tokio::test]
async fn slow_jwks_is_cut_off_as_key_resolution_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::jwks())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let verifier = common::verifier_with_key_timeout(&server, Duration::from_millis(300));

    let started = Instant::now();
    let outcome = verifier.verify(Some(&bearer(&sign(&claims(3600))))).await;

    assert_eq!(rejected_kind(outcome), AuthErrorKind::KeyResolutionFailed);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn concurrent_requests_during_outage_share_one_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;
    let verifier = Arc::new(verifier(&server));
    let header = bearer(&sign(&claims(3600)));

    let started = Instant::now();
    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let verifier = Arc::clone(&verifier);
            let header = header.clone();
            tokio::spawn(async move { verifier.verify(Some(&header)).await })
        })
        .collect();
    for task in tasks {
        let outcome = task.await.unwrap();
        assert_eq!(rejected_kind(outcome), AuthErrorKind::KeyResolutionFailed);
    }

    assert!(started.elapsed() < Duration::from_secs(2));
}
