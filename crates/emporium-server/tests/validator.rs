use std::time::Duration;

use emporium_server::{HttpOwnerValidator, OwnerValidator, ValidatorError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn validator_for(server: &MockServer) -> HttpOwnerValidator {
    HttpOwnerValidator::new(format!("{}/", server.uri()), Duration::from_millis(300)).unwrap()
}

#[tokio::test]
async fn existing_owner() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "u1"})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(validator_for(&server).await.exists("u1").await.unwrap());
}

#[tokio::test]
async fn unknown_owner() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(!validator_for(&server).await.exists("ghost").await.unwrap());
}

#[tokio::test]
async fn reserved_characters_do_not_alias_another_owner() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let validator = validator_for(&server).await;
    assert!(validator.exists("alice").await.unwrap());
    for id in ["alice?x", "alice#x", "alice%2Fx", "alice/x", "alice/../alice"] {
        assert!(!validator.exists(id).await.unwrap(), "{id} resolved to alice");
    }
}

#[tokio::test]
async fn server_error_is_not_a_missing_owner() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = validator_for(&server).await.exists("u1").await.unwrap_err();
    assert!(matches!(
        err,
        ValidatorError::UnexpectedStatus { status: 500, .. }
    ));
}

#[tokio::test]
async fn slow_identity_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = validator_for(&server).await.exists("u1").await.unwrap_err();
    assert!(matches!(err, ValidatorError::Transport(_)));
}

#[tokio::test]
async fn unreachable_identity_service() {
    let validator =
        HttpOwnerValidator::new("http://127.0.0.1:9", Duration::from_millis(300)).unwrap();
    let err = validator.exists("u1").await.unwrap_err();
    assert!(matches!(err, ValidatorError::Transport(_)));
}
