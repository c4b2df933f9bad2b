// Authentication API tests against mockito
// Cover login/register/logout/profile and the simple gateway paths

use formsync::{
    FormSyncClient, Gateway, GatewayError, Role,
    auth::{MemoryTokenStore, TokenKind, TokenStore},
};
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn client_for(url: &str, store: Arc<MemoryTokenStore>) -> (FormSyncClient, Arc<AtomicUsize>) {
    let expirations = Arc::new(AtomicUsize::new(0));
    let counter = expirations.clone();

    let gateway = Gateway::builder(url)
        .token_store(store)
        .on_auth_expired(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();

    (FormSyncClient::new(gateway), expirations)
}

#[tokio::test]
async fn test_login_stores_both_tokens() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/auth/login")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({
            "email": "ana@example.com",
            "password": "secret"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"accessToken":"T1","refreshToken":"R1"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let (client, _) = client_for(&server.url(), store.clone());

    let pair = client.login("ana@example.com", "secret").await.unwrap();
    assert_eq!(pair.access_token, "T1");
    assert!(client.is_authenticated().await);
    assert_eq!(store.get(TokenKind::Refresh).await.unwrap().as_deref(), Some("R1"));
    login.assert_async().await;
}

#[tokio::test]
async fn test_login_with_bad_password_does_not_renew() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/auth/login")
        .with_status(401)
        .with_body(r#"{"message":"Unauthorized","statusCode":401}"#)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::with_tokens("OLD", "R-OLD"));
    let (client, expirations) = client_for(&server.url(), store.clone());

    let err = client.login("ana@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidCredentials));
    assert_eq!(store.get(TokenKind::Access).await.unwrap().as_deref(), Some("OLD"));
    assert_eq!(expirations.load(Ordering::SeqCst), 0);
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_register_surfaces_validation_messages() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/auth/register")
        .match_body(Matcher::PartialJson(json!({ "name": "Ana" })))
        .with_status(400)
        .with_body(r#"{"message":["email must be an email","password is too short"]}"#)
        .create_async()
        .await;

    let (client, _) = client_for(&server.url(), Arc::new(MemoryTokenStore::new()));

    match client.register("Ana", "not-an-email", "x").await {
        Err(GatewayError::Status { status, message }) => {
            assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
            assert_eq!(message, "email must be an email, password is too short");
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_profile_renews_once_and_propagates_token() {
    let mut server = mockito::Server::new_async().await;
    let stale = server
        .mock("GET", "/auth/profile")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .match_body(Matcher::Json(json!({ "refreshToken": "R1" })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"accessToken":"T2","refreshToken":"R2"}"#)
        .expect(1)
        .create_async()
        .await;
    let fresh = server
        .mock("GET", "/auth/profile")
        .match_header("authorization", "Bearer T2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":7,"email":"ana@example.com","name":"Ana","role":"DocBuilder"}"#)
        .expect(2)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::with_tokens("T1", "R1"));
    let (client, expirations) = client_for(&server.url(), store.clone());

    let profile = client.profile().await.unwrap();
    assert_eq!(profile.display_name(), "Ana");
    assert_eq!(profile.role, Role::DocBuilder);

    // A later call goes straight out with the renewed token
    client.profile().await.unwrap();

    assert_eq!(store.get(TokenKind::Access).await.unwrap().as_deref(), Some("T2"));
    assert_eq!(store.get(TokenKind::Refresh).await.unwrap().as_deref(), Some("R2"));
    assert_eq!(expirations.load(Ordering::SeqCst), 0);
    stale.assert_async().await;
    refresh.assert_async().await;
    fresh.assert_async().await;
}

#[tokio::test]
async fn test_non_401_errors_pass_through() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/form-templates/99")
        .with_status(404)
        .with_body(r#"{"message":"Template 99 not found"}"#)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let (client, _) = client_for(&server.url(), Arc::new(MemoryTokenStore::with_tokens("T1", "R1")));

    let err = client.form_template(99).await.unwrap_err();
    assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
    assert!(!err.is_auth_terminal());
    assert!(err.to_string().contains("Template 99 not found"));
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_logout_clears_local_session_even_if_server_fails() {
    let mut server = mockito::Server::new_async().await;
    let logout = server
        .mock("POST", "/auth/logout")
        .match_header("authorization", "Bearer T1")
        .with_status(500)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::with_tokens("T1", "R1"));
    let (client, expirations) = client_for(&server.url(), store.clone());

    client.logout().await;

    assert!(!client.is_authenticated().await);
    assert!(store.get(TokenKind::Refresh).await.unwrap().is_none());
    assert_eq!(expirations.load(Ordering::SeqCst), 0);
    logout.assert_async().await;
}

#[tokio::test]
async fn test_login_rearms_expiry_notification() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/form-instances/my")
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/auth/refresh")
        .with_status(401)
        .with_body(r#"{"message":"Refresh token revoked"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/auth/login")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"accessToken":"T1","refreshToken":"R1"}"#)
        .create_async()
        .await;

    let (client, expirations) = client_for(&server.url(), Arc::new(MemoryTokenStore::new()));

    // No credentials at all: renewal is impossible
    assert!(client.my_form_instances().await.unwrap_err().is_auth_terminal());
    assert_eq!(expirations.load(Ordering::SeqCst), 1);

    client.login("ana@example.com", "secret").await.unwrap();

    // Fresh session, revoked refresh token: notified again
    assert!(client.my_form_instances().await.unwrap_err().is_auth_terminal());
    assert_eq!(expirations.load(Ordering::SeqCst), 2);
    assert!(!client.is_authenticated().await);
}

#[tokio::test]
async fn test_create_instance_posts_json_with_bearer() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/form-instances")
        .match_header("authorization", "Bearer T1")
        .match_body(Matcher::Json(json!({ "templateId": 3, "data": { "name": "Ana" } })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":41,"templateId":3}"#)
        .create_async()
        .await;

    let (client, _) = client_for(&server.url(), Arc::new(MemoryTokenStore::with_tokens("T1", "R1")));

    let created = client
        .create_form_instance(&json!({ "templateId": 3, "data": { "name": "Ana" } }))
        .await
        .unwrap();
    assert_eq!(created["id"], 41);
    create.assert_async().await;
}
