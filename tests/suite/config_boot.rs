//! Booting a server from a config file the way the binary does.

use std::fs;
use std::sync::Arc;

use switchyard_client::{HttpLink, RpcClient};
use switchyard_config::{AuthMode, SwitchyardConfig, resolve_base_url};
use switchyard_rpc::{AuthContextFactory, HeaderAuthProvider};
use switchyard_server::AppState;
use switchyard_types::ErrorCode;
use tempfile::tempdir;

use crate::common::{application, start_server};

#[tokio::test]
async fn header_auth_and_custom_base_path_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[server]
base_path = "/rpc/"

[auth]
mode = "header"
header = "X-Caller"
"#,
    )
    .unwrap();

    let config = SwitchyardConfig::load_from(path).unwrap().unwrap();
    assert_eq!(config.auth_mode(), AuthMode::Header);
    assert_eq!(config.base_path(), "/rpc");

    let state = AppState::new(
        application(),
        Arc::new(AuthContextFactory::new(HeaderAuthProvider::new(
            config.auth_header(),
        ))),
    )
    .with_base_path(&config.base_path());
    let server = start_server(state).await;

    let link = HttpLink::new(&server.base_url, &config.base_path())
        .unwrap()
        .with_header("x-caller", "user9");
    assert_eq!(RpcClient::new(link).whoami().await.unwrap().user_id, "user9");

    // The default mount point is not served.
    let stray = HttpLink::new(&server.base_url, "/api/trpc").unwrap();
    let err = RpcClient::new(stray).get_users().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    server.stop().await;
}

#[test]
fn broken_config_is_an_error_not_a_panic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server\nport = ").unwrap();
    let err = SwitchyardConfig::load_from(path.clone()).unwrap_err();
    assert_eq!(err.path(), &path);
}

#[test]
fn local_base_url_feeds_the_link() {
    let base = resolve_base_url(None, 4100);
    let link = HttpLink::new(base.as_str(), "/api/trpc").unwrap();
    assert_eq!(link.endpoint().as_str(), "http://localhost:4100/api/trpc");

    let hosted = resolve_base_url(Some("app.example.com"), 4100);
    let link = HttpLink::new(hosted.as_str(), "/api/trpc").unwrap();
    assert_eq!(
        link.procedure_url("getUsers").unwrap().as_str(),
        "https://app.example.com/api/trpc/getUsers"
    );
}
