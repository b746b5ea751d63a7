mod common;

use std::sync::Arc;
use std::time::Duration;

use emporium_core::{IdentityPatch, Registration};
use emporium_server::ServiceError;
use emporium_server::auth::TokenIssuer;
use emporium_server::cache::confirmation_code_key;
use emporium_storage::IdentityStore;

fn registration(username: &str, email: &str) -> Registration {
    Registration {
        username: username.into(),
        email: email.into(),
        password: "correct horse".into(),
    }
}

async fn stored_code(h: &common::IdentityHarness, email: &str) -> String {
    let raw = h
        .cache
        .backend()
        .get(&confirmation_code_key(email))
        .await
        .unwrap()
        .expect("confirmation code cached");
    String::from_utf8(raw.to_vec()).unwrap()
}

#[tokio::test]
async fn concurrent_registrations_with_same_email_create_one_user() {
    let h = common::identity();

    let (a, b) = tokio::join!(
        h.service.register(registration("ada", "ada@example.com")),
        h.service.register(registration("lovelace", "ada@example.com")),
    );

    let results = [a, b];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::AlreadyExists(_))))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_registrations_with_same_email_create_one_user() {
    const ATTEMPTS: usize = 16;
    let h = common::identity();

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|i| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move {
                service
                    .register(registration(&format!("user{i}"), "ada@example.com"))
                    .await
            })
        })
        .collect();

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(ServiceError::AlreadyExists(_)) => conflicts += 1,
            Err(other) => panic!("unexpected registration error: {other}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(conflicts, ATTEMPTS - 1);
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn duplicate_email_is_rejected_after_commit() {
    let h = common::identity();
    h.service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap();

    let err = h
        .service
        .register(registration("other", "ada@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyExists(_)));
}

#[tokio::test]
async fn registration_sends_code_and_event() {
    let h = common::identity();
    let registered = h
        .service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap();
    let code = stored_code(&h, "ada@example.com").await;
    assert_eq!(code.len(), 6);

    let events = h.events.wait_for(1).await;
    assert_eq!(events[0].topic, "user_registered");
    assert_eq!(events[0].payload["user_id"], registered.user_id.as_str());
    assert_eq!(events[0].payload["email"], "ada@example.com");

    let mut sent = Vec::new();
    for _ in 0..200 {
        sent = h.email.sent().await;
        if !sent.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert!(sent[0].body.contains(&code));
}

#[tokio::test]
async fn invalid_registration_stores_nothing() {
    let h = common::identity();
    let err = h
        .service
        .register(registration("ada", "not-an-email"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn code_confirms_exactly_once() {
    let h = common::identity();
    let user_id = h
        .service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap()
        .user_id;
    let code = stored_code(&h, "ada@example.com").await;

    let (a, b) = tokio::join!(
        h.service.confirm("ada@example.com", &code),
        h.service.confirm("ada@example.com", &code),
    );
    let successes = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|r| r.success)
        .count();
    assert_eq!(successes, 1);

    assert!(h.service.get(&user_id).await.unwrap().confirmed);
    let again = h.service.confirm("ada@example.com", &code).await.unwrap();
    assert!(!again.success);
}

#[tokio::test]
async fn wrong_code_does_not_consume_the_real_one() {
    let h = common::identity();
    h.service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap();
    let code = stored_code(&h, "ada@example.com").await;
    let wrong = if code == "000000" { "000001" } else { "000000" };

    let rejected = h.service.confirm("ada@example.com", wrong).await.unwrap();
    assert!(!rejected.success);

    let accepted = h.service.confirm("ada@example.com", &code).await.unwrap();
    assert!(accepted.success);
}

#[tokio::test]
async fn confirmation_is_visible_through_the_cache() {
    let h = common::identity();
    let user_id = h
        .service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap()
        .user_id;
    assert!(!h.service.get(&user_id).await.unwrap().confirmed);

    let code = stored_code(&h, "ada@example.com").await;
    h.service.confirm("ada@example.com", &code).await.unwrap();

    assert!(h.service.get(&user_id).await.unwrap().confirmed);
    let topics = h.events.wait_for(2).await;
    assert!(topics.iter().any(|e| e.topic == "user_confirmed"));
}

#[tokio::test]
async fn confirming_unknown_email_is_not_found() {
    let h = common::identity();
    let err = h
        .service
        .confirm("nobody@example.com", "123456")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn confirming_a_malformed_email_is_invalid() {
    let h = common::identity();
    let err = h.service.confirm("not-an-email", "123456").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
}

#[tokio::test]
async fn login_issues_a_verifiable_token() {
    let h = common::identity();
    let user_id = h
        .service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap()
        .user_id;

    let login = h
        .service
        .login("ada@example.com", "correct horse")
        .await
        .unwrap();
    assert_eq!(login.user_id, user_id);

    let issuer = TokenIssuer::new(common::TOKEN_SECRET, Duration::from_secs(3600));
    let claims = issuer.verify(&login.token).unwrap();
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.email, "ada@example.com");
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let h = common::identity();
    h.service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap();

    let err = h
        .service
        .login("ada@example.com", "battery staple")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredential(_)));
}

#[tokio::test]
async fn deleting_a_user_drops_the_pending_code() {
    let h = common::identity();
    let user_id = h
        .service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap()
        .user_id;

    h.service.delete(&user_id).await.unwrap();

    let cached = h
        .cache
        .backend()
        .get(&confirmation_code_key("ada@example.com"))
        .await
        .unwrap();
    assert!(cached.is_none());
    assert!(matches!(
        h.service.get(&user_id).await.unwrap_err(),
        ServiceError::NotFound(_)
    ));
}

#[tokio::test]
async fn password_change_does_not_undo_a_concurrent_confirmation() {
    let h = common::identity_with_hasher(Arc::new(common::SlowHasher {
        delay: Duration::from_millis(300),
    }));
    let user_id = h
        .service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap()
        .user_id;
    let code = stored_code(&h, "ada@example.com").await;

    let patch = IdentityPatch {
        password: Some("new horse".into()),
        ..Default::default()
    };
    let (updated, confirmed) = tokio::join!(h.service.update(&user_id, patch), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.service.confirm("ada@example.com", &code).await
    });

    assert!(confirmed.unwrap().success);
    assert!(updated.unwrap().confirmed);
    assert!(h.store.get(&user_id).await.unwrap().unwrap().confirmed);
    assert!(h.service.get(&user_id).await.unwrap().confirmed);
}

#[tokio::test]
async fn pending_code_follows_an_email_change() {
    let h = common::identity();
    let user_id = h
        .service
        .register(registration("ada", "ada@example.com"))
        .await
        .unwrap()
        .user_id;
    let code = stored_code(&h, "ada@example.com").await;

    let patch = IdentityPatch {
        email: Some("lovelace@example.com".into()),
        ..Default::default()
    };
    h.service.update(&user_id, patch).await.unwrap();

    assert!(matches!(
        h.service.confirm("ada@example.com", &code).await.unwrap_err(),
        ServiceError::NotFound(_)
    ));
    let confirmed = h
        .service
        .confirm("lovelace@example.com", &code)
        .await
        .unwrap();
    assert!(confirmed.success);
    assert!(h.service.get(&user_id).await.unwrap().confirmed);
}
