//! End-to-end grant flows against the in-memory backend.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use grantflow::oauth::OAuth2Request;
use grantflow::types::{Client, GrantType, ResponseType, TokenEndpointAuthMethod, User};
use grantflow::{AuthorizationServer, ServerConfig};
use grantflow_memory::MemoryStore;

const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

fn store() -> Arc<MemoryStore> {
    let spa = Client::new("spa")
        .with_auth_method(TokenEndpointAuthMethod::None)
        .with_redirect_uri("https://spa.example/cb")
        .with_response_types([ResponseType::Code])
        .with_grant_types([
            GrantType::AuthorizationCode,
            GrantType::RefreshToken,
            GrantType::Password,
            GrantType::DeviceCode,
        ])
        .with_scope("profile email");
    Arc::new(
        MemoryStore::new()
            .with_client(spa)
            .with_user(User::new("1", "foo"), "correct horse")
            .unwrap(),
    )
}

fn server(store: &Arc<MemoryStore>) -> Arc<AuthorizationServer> {
    Arc::new(
        AuthorizationServer::builder()
            .config(ServerConfig::default())
            .clients(store.clone())
            .tokens(store.clone())
            .codes(store.clone())
            .users(store.clone())
            .devices(store.clone())
            .with_default_grants()
            .build()
            .unwrap(),
    )
}

fn post(params: &[(&str, &str)]) -> OAuth2Request {
    OAuth2Request::new(Method::POST, "https://auth.example/oauth/token")
        .with_params(params.iter().copied())
}

async fn authorize(server: &AuthorizationServer) -> String {
    let request = OAuth2Request::new(
        Method::GET,
        format!(
            "https://auth.example/oauth/authorize?response_type=code&client_id=spa\
             &scope=profile&state=st&code_challenge={CHALLENGE}&code_challenge_method=S256"
        ),
    );
    let response = server
        .create_authorization_response(&request, Some(&User::new("1", "foo")))
        .await;
    assert_eq!(response.status, StatusCode::FOUND);
    let location = url::Url::parse(response.location().unwrap()).unwrap();
    let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("state".to_string(), "st".to_string())));
    pairs
        .into_iter()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v)
        .unwrap()
}

#[tokio::test]
async fn authorization_code_with_pkce_then_refresh() {
    let store = store();
    let server = server(&store);
    let code = authorize(&server).await;

    let response = server
        .create_token_response(&post(&[
            ("grant_type", "authorization_code"),
            ("client_id", "spa"),
            ("code", &code),
            ("code_verifier", VERIFIER),
        ]))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json_body().unwrap().clone();
    assert_eq!(body["scope"], "profile");
    let refresh = body["refresh_token"].as_str().unwrap();

    let response = server
        .create_token_response(&post(&[
            ("grant_type", "refresh_token"),
            ("client_id", "spa"),
            ("refresh_token", refresh),
        ]))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let rotated = response.json_body().unwrap();
    assert_ne!(rotated["refresh_token"], body["refresh_token"]);
    assert_eq!(store.token_count(), 2);
}

#[tokio::test]
async fn wrong_verifier_burns_code() {
    let store = store();
    let server = server(&store);
    let code = authorize(&server).await;

    let response = server
        .create_token_response(&post(&[
            ("grant_type", "authorization_code"),
            ("client_id", "spa"),
            ("code", &code),
            ("code_verifier", "x".repeat(43).as_str()),
        ]))
        .await;
    assert_eq!(response.json_body().unwrap()["error"], "invalid_grant");

    let response = server
        .create_token_response(&post(&[
            ("grant_type", "authorization_code"),
            ("client_id", "spa"),
            ("code", &code),
            ("code_verifier", VERIFIER),
        ]))
        .await;
    assert_eq!(response.json_body().unwrap()["error"], "invalid_grant");
}

#[tokio::test]
async fn concurrent_code_exchange_issues_once() {
    let store = store();
    let server = server(&store);
    let code = authorize(&server).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let server = server.clone();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            server
                .create_token_response(&post(&[
                    ("grant_type", "authorization_code"),
                    ("client_id", "spa"),
                    ("code", &code),
                    ("code_verifier", VERIFIER),
                ]))
                .await
                .status
        }));
    }

    let mut issued = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::OK {
            issued += 1;
        }
    }
    assert_eq!(issued, 1);
    assert_eq!(store.token_count(), 1);
}

#[tokio::test]
async fn concurrent_refresh_rotates_once() {
    let store = store();
    let server = server(&store);

    let response = server
        .create_token_response(&post(&[
            ("grant_type", "password"),
            ("client_id", "spa"),
            ("username", "foo"),
            ("password", "correct horse"),
        ]))
        .await;
    let refresh = response.json_body().unwrap()["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let server = server.clone();
        let refresh = refresh.clone();
        handles.push(tokio::spawn(async move {
            server
                .create_token_response(&post(&[
                    ("grant_type", "refresh_token"),
                    ("client_id", "spa"),
                    ("refresh_token", &refresh),
                ]))
                .await
                .status
        }));
    }

    let mut issued = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::OK {
            issued += 1;
        }
    }
    assert_eq!(issued, 1);
    assert_eq!(store.token_count(), 2);
}

#[tokio::test]
async fn password_grant_checks_argon2_hash() {
    let store = store();
    let server = server(&store);

    let response = server
        .create_token_response(&post(&[
            ("grant_type", "password"),
            ("client_id", "spa"),
            ("username", "foo"),
            ("password", "correct horse"),
        ]))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = server
        .create_token_response(&post(&[
            ("grant_type", "password"),
            ("client_id", "spa"),
            ("username", "foo"),
            ("password", "battery staple"),
        ]))
        .await;
    assert_eq!(response.json_body().unwrap()["error"], "invalid_grant");
}

#[tokio::test]
async fn denied_device_authorization() {
    let store = store();
    let server = server(&store);

    let response = server
        .create_device_authorization_response(&post(&[("client_id", "spa")]))
        .await;
    let body = response.json_body().unwrap().clone();
    let user_code = body["user_code"].as_str().unwrap();
    assert_eq!(user_code.len(), 9);
    assert!(
        body["verification_uri_complete"]
            .as_str()
            .unwrap()
            .ends_with(&format!("user_code={user_code}"))
    );

    server.deny_device(user_code).await.unwrap();
    let response = server
        .create_token_response(&post(&[
            ("grant_type", GrantType::DeviceCode.as_str()),
            ("client_id", "spa"),
            ("device_code", body["device_code"].as_str().unwrap()),
        ]))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json_body().unwrap()["error"], "access_denied");
}
