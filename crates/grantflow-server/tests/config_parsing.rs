use std::time::Duration;
use std::{env, fs};

use grantflow::types::TokenEndpointAuthMethod;
use grantflow_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("grantflow.toml");
    let fixtures_path = dir.path().join("fixtures.toml");

    fs::write(
        &fixtures_path,
        r#"
[[clients]]
client_id = "cli"
token_endpoint_auth_method = "none"
grant_types = ["urn:ietf:params:oauth:grant-type:device_code"]
scope = "profile"
"#,
    )
    .expect("write fixtures");

    let toml_content = format!(
        r#"
[server]
host = "127.0.0.1"
port = 8081
body_limit_bytes = 1024

[logging]
level = "debug"

[storage]
purge_interval = "30s"

[oauth]
allow_insecure_transport = true
scopes_supported = ["profile"]

[oauth.error_uris]
invalid_scope = "https://docs.example/errors#invalid_scope"

[oauth.tokens]
implicit_lifetime = "15m"

[fixtures]
file = "{}"

[[fixtures.clients]]
client_id = "implicit-client"
token_endpoint_auth_method = "none"
redirect_uris = ["http://localhost/authorized"]
response_types = ["token"]
grant_types = ["implicit"]
scope = "profile"

[[fixtures.users]]
id = "1"
username = "foo"
password = "ok"
"#,
        fixtures_path.display()
    );
    fs::write(&path, toml_content).expect("write config");

    let cfg = load_config(Some(path.to_str().unwrap())).expect("load config");
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.storage.purge_interval, Duration::from_secs(30));
    assert!(cfg.oauth.allow_insecure_transport);
    assert_eq!(
        cfg.oauth.tokens.implicit_lifetime,
        Duration::from_secs(15 * 60)
    );
    assert_eq!(
        cfg.oauth.error_uris.get("invalid_scope").map(String::as_str),
        Some("https://docs.example/errors#invalid_scope")
    );
    assert_eq!(cfg.fixtures.clients.len(), 1);
    assert_eq!(
        cfg.fixtures.clients[0].token_endpoint_auth_method,
        TokenEndpointAuthMethod::None
    );

    let fixtures = cfg.fixtures.load().expect("load fixtures");
    assert_eq!(fixtures.clients.len(), 2);
    assert_eq!(fixtures.users.len(), 1);

    // Environment override
    unsafe {
        env::set_var("GRANTFLOW__SERVER__PORT", "9090");
    }
    let cfg2 = load_config(Some(path.to_str().unwrap())).expect("load with env");
    assert_eq!(cfg2.server.port, 9090);
    unsafe {
        env::remove_var("GRANTFLOW__SERVER__PORT");
    }

    // Validation failure
    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[oauth.error_uris]\nnot_a_code = \"https://docs.example\"\n")
        .expect("write bad config");
    let err = load_config(Some(bad.to_str().unwrap())).unwrap_err();
    assert!(err.contains("not_a_code"), "{err}");
}
