use std::sync::Arc;

use grantflow::oauth::{Scope, TokenGenerator, generate_token};
use grantflow::types::{ResponseType, TokenEndpointAuthMethod};
use grantflow::{Client, GrantType, User};
use grantflow_server::fixtures::UserFixture;
use grantflow_server::{AppConfig, build_app, build_state};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::task::JoinHandle;

const AUTHORIZE: &str = "/oauth/authorize?response_type=token&client_id=implicit-client";

fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.oauth.allow_insecure_transport = true;
    cfg.fixtures.clients = vec![
        Client::new("implicit-client")
            .with_auth_method(TokenEndpointAuthMethod::None)
            .with_redirect_uri("http://localhost/authorized")
            .with_response_types([ResponseType::Token])
            .with_grant_types([GrantType::Implicit])
            .with_scope("profile"),
        Client::new("code-only-client")
            .with_auth_method(TokenEndpointAuthMethod::None)
            .with_redirect_uri("http://localhost/authorized")
            .with_response_types([ResponseType::Code])
            .with_grant_types([GrantType::Implicit])
            .with_scope("profile"),
        Client::new("backend")
            .with_secret("backend-secret")
            .with_redirect_uri("http://localhost/callback")
            .with_response_types([ResponseType::Token])
            .with_grant_types([GrantType::Implicit, GrantType::ClientCredentials])
            .with_scope("profile email"),
        Client::new("tv")
            .with_auth_method(TokenEndpointAuthMethod::None)
            .with_grant_types([GrantType::DeviceCode])
            .with_scope("profile"),
    ];
    cfg.fixtures.users = vec![UserFixture {
        id: "1".into(),
        username: "foo".into(),
        password: "ok".into(),
        active: true,
    }];
    cfg
}

async fn start_server(
    cfg: AppConfig,
    generator: Option<Arc<dyn TokenGenerator>>,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let state = build_state(&cfg, generator).expect("state");
    let app = build_app(state, &cfg);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, handle)
}

async fn stop_server(tx: tokio::sync::oneshot::Sender<()>, handle: JoinHandle<()>) {
    let _ = tx.send(());
    let _ = handle.await;
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn location(res: &reqwest::Response) -> String {
    res.headers()
        .get(reqwest::header::LOCATION)
        .expect("location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn consent_page_reports_ok() {
    let (base, tx, handle) = start_server(config(), None).await;
    let client = http_client();

    let res = client.get(format!("{base}{AUTHORIZE}")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok");

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn consent_page_reports_errors() {
    let mut cfg = config();
    cfg.oauth.scopes_supported = Some(vec!["profile".into()]);
    let (base, tx, handle) = start_server(cfg, None).await;
    let client = http_client();

    let body = client
        .get(format!(
            "{base}/oauth/authorize?response_type=token&client_id=backend"
        ))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("error=invalid_client"), "{body}");

    let body = client
        .get(format!(
            "{base}/oauth/authorize?response_type=token&client_id=code-only-client"
        ))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("error=unauthorized_client"), "{body}");

    let body = client
        .get(format!("{base}{AUTHORIZE}&scope=email&state=bar"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("error=invalid_scope"), "{body}");
    assert!(body.contains("state=bar"), "{body}");

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn authorization_without_user_is_denied() {
    let (base, tx, handle) = start_server(config(), None).await;

    let res = http_client()
        .post(format!("{base}{AUTHORIZE}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(location(&res).contains("#error=access_denied"));

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn implicit_token_in_fragment() {
    let (base, tx, handle) = start_server(config(), None).await;
    let client = http_client();

    let res = client
        .post(format!("{base}{AUTHORIZE}"))
        .form(&[("user_id", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(location(&res).contains("access_token="));

    let res = client
        .post(format!("{base}{AUTHORIZE}&state=bar&scope=profile"))
        .form(&[("user_id", "1")])
        .send()
        .await
        .unwrap();
    let location = location(&res);
    assert!(location.starts_with("http://localhost/authorized#"));
    assert!(location.contains("access_token="));
    assert!(location.contains("state=bar"));
    assert!(location.contains("scope=profile"));

    stop_server(tx, handle).await;
}

fn prefixed_token(client: &Client, grant_type: GrantType, user: Option<&User>, _: &Scope) -> String {
    let mut token = format!("{}-{grant_type}", &client.client_id[..1]);
    if let Some(user) = user {
        token = format!("{token}.{}", user.id);
    }
    format!("{token}.{}", generate_token(32))
}

fn fragment_param(location: &str, name: &str) -> Option<String> {
    let url = reqwest::Url::parse(location).ok()?;
    let fragment = url.fragment()?.to_string();
    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[tokio::test]
async fn custom_token_generator_issues_unique_tokens() {
    let (base, tx, handle) = start_server(config(), Some(Arc::new(prefixed_token))).await;
    let client = http_client();

    let mut issued = Vec::new();
    for _ in 0..2 {
        let res = client
            .post(format!("{base}{AUTHORIZE}"))
            .form(&[("user_id", "1")])
            .send()
            .await
            .unwrap();
        let access_token = fragment_param(&location(&res), "access_token").unwrap();
        assert!(access_token.starts_with("i-implicit.1."));
        issued.push(access_token);
    }
    assert_ne!(issued[0], issued[1]);

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn invalid_scope_redirects_without_user() {
    let mut cfg = config();
    cfg.oauth.scopes_supported = Some(vec!["profile".into()]);
    let (base, tx, handle) = start_server(cfg, None).await;

    let res = http_client()
        .post(format!("{base}{AUTHORIZE}&scope=invalid"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(location(&res).contains("#error=invalid_scope"));

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn public_client_disallowed_grant() {
    let (base, tx, handle) = start_server(config(), None).await;

    let res = http_client()
        .post(format!("{base}/oauth/token"))
        .form(&[
            ("grant_type", "password"),
            ("client_id", "implicit-client"),
            ("username", "foo"),
            ("password", "ok"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized_client");

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn token_introspection_and_revocation() {
    let (base, tx, handle) = start_server(config(), None).await;
    let client = http_client();

    let res = client
        .post(format!("{base}/oauth/token"))
        .basic_auth("backend", Some("backend-secret"))
        .form(&[("grant_type", "client_credentials"), ("scope", "profile")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(reqwest::header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
    let body: Value = res.json().await.unwrap();
    let access_token = body["access_token"].as_str().unwrap().to_string();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["scope"], "profile");

    let introspect = |token: String| {
        client
            .post(format!("{base}/oauth/introspect"))
            .basic_auth("backend", Some("backend-secret"))
            .form(&[("token", token)])
            .send()
    };

    let body: Value = introspect(access_token.clone())
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["active"], true);
    assert_eq!(body["client_id"], "backend");

    let res = client
        .post(format!("{base}/oauth/revoke"))
        .basic_auth("backend", Some("backend-secret"))
        .form(&[("token", access_token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = introspect(access_token).await.unwrap().json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "active": false }));

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn token_endpoint_errors() {
    let (base, tx, handle) = start_server(config(), None).await;
    let client = http_client();

    let res = client
        .get(format!("{base}/oauth/token?grant_type=client_credentials"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unsupported_grant_type");

    let res = client
        .post(format!("{base}/oauth/token"))
        .basic_auth("backend", Some("wrong"))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(reqwest::header::WWW_AUTHENTICATE));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_client");

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn device_flow_over_http() {
    let (base, tx, handle) = start_server(config(), None).await;
    let client = http_client();

    let body: Value = client
        .post(format!("{base}/oauth/device_authorization"))
        .form(&[("client_id", "tv"), ("scope", "profile")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let device_code = body["device_code"].as_str().unwrap().to_string();
    let user_code = body["user_code"].as_str().unwrap().to_string();
    assert_eq!(body["interval"], 5);

    let poll = || {
        client
            .post(format!("{base}/oauth/token"))
            .form(&[
                ("grant_type", GrantType::DeviceCode.as_str()),
                ("client_id", "tv"),
                ("device_code", device_code.as_str()),
            ])
            .send()
    };

    let body: Value = poll().await.unwrap().json().await.unwrap();
    assert_eq!(body["error"], "authorization_pending");

    let res = client
        .post(format!("{base}/oauth/device"))
        .form(&[("user_code", user_code.as_str()), ("user_id", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = poll().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["access_token"].is_string());
    assert_eq!(body["scope"], "profile");

    stop_server(tx, handle).await;
}

#[tokio::test]
async fn healthz() {
    let (base, tx, handle) = start_server(config(), None).await;

    let body: Value = http_client()
        .get(format!("{base}/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    stop_server(tx, handle).await;
}
