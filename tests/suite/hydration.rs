//! Server render pass → serialized snapshot → browser cache.

use std::sync::Arc;

use serde_json::{Value, json};
use switchyard_client::{
    ClientBridge, LocalLink, RenderEnvironment, RpcClient, get_query_client,
};
use switchyard_query::{
    DehydratedState, QueryClientConfig, QueryKey, QueryStatus, make_query_client,
};
use switchyard_rpc::{GET_USERS, HELLO};
use switchyard_types::{RequestContext, RequestId, UserId};

use crate::common::{application, start_app_server};

fn render_pass_bridge() -> ClientBridge {
    let ctx = Arc::new(RequestContext::new(
        RequestId::new("render"),
        Some(UserId::new("user_123").unwrap()),
    ));
    let rpc = RpcClient::new(LocalLink::new(application().create_caller(ctx)));
    ClientBridge::for_environment(RenderEnvironment::Server, rpc)
}

#[tokio::test]
async fn prefetched_data_survives_the_trip_to_the_browser() {
    let ssr = render_pass_bridge();
    ssr.prefetch(GET_USERS, json!({})).await;
    ssr.prefetch(HELLO, json!({"text": "ssr"})).await;
    ssr.prefetch("missing", Value::Null).await;

    let snapshot = ssr.dehydrate();
    assert_eq!(snapshot.len(), 2, "error entries stay on the server");
    let wire = serde_json::to_string(&snapshot).unwrap();

    // The browser points at a server that is already gone: every read below
    // must come from the hydrated cache.
    let server = start_app_server().await;
    let rpc = server.rpc();
    server.stop().await;

    let browser = ClientBridge::new(make_query_client(QueryClientConfig::default()), rpc);
    let restored: DehydratedState = serde_json::from_str(&wire).unwrap();
    assert_eq!(browser.hydrate(restored), 2);

    assert_eq!(browser.use_query(GET_USERS, json!({})).await.unwrap(), json!({}));
    assert_eq!(
        browser
            .use_query(HELLO, json!({"text": "ssr"}))
            .await
            .unwrap()["greeting"],
        "hello ssr"
    );
    assert!(
        browser
            .query_client()
            .get_query_state(&QueryKey::new("missing", &Value::Null))
            .is_none()
    );
}

#[tokio::test]
async fn hydrated_entries_keep_their_status() {
    let ssr = render_pass_bridge();
    ssr.prefetch(GET_USERS, json!({})).await;

    let browser = ClientBridge::new(
        make_query_client(QueryClientConfig::default()),
        ssr.rpc().clone(),
    );
    browser.hydrate(ssr.dehydrate());
    let state = browser
        .query_client()
        .get_query_state(&QueryKey::new(GET_USERS, &json!({})))
        .unwrap();
    assert_eq!(state.status, QueryStatus::Success);
    assert_eq!(state.data, Some(json!({})));
}

#[tokio::test]
async fn render_passes_never_share_a_cache() {
    let first = render_pass_bridge();
    let second = render_pass_bridge();
    first.prefetch(GET_USERS, json!({})).await;

    assert!(!first.query_client().ptr_eq(second.query_client()));
    assert!(second.query_client().is_empty());
    assert!(
        get_query_client(RenderEnvironment::Browser)
            .ptr_eq(&get_query_client(RenderEnvironment::Browser))
    );
}
