//! Client proxy and bridge against a live server.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use switchyard_client::{ClientBridge, HttpLink, LocalLink, RpcClient};
use switchyard_query::{QueryClientConfig, QueryKey, make_query_client};
use switchyard_rpc::{
    AuthContextFactory, GET_USERS, HELLO, HeaderAuthProvider, RouterBuilder, WHOAMI, mutation,
    query,
};
use switchyard_server::AppState;
use switchyard_types::{ErrorCode, RequestContext, RequestId, RpcError, UserId};

use crate::common::{application, start_app_server, start_server, static_contexts};

#[tokio::test]
async fn every_procedure_is_reachable_over_http() {
    let server = start_app_server().await;
    let rpc = server.rpc();

    assert_eq!(rpc.get_users().await.unwrap(), json!({}));
    assert_eq!(rpc.hello("world").await.unwrap().greeting, "hello world");
    assert_eq!(rpc.whoami().await.unwrap().user_id, "user_123");

    server.stop().await;
}

#[tokio::test]
async fn local_and_http_links_agree() {
    let server = start_app_server().await;
    let remote = server.rpc();
    let ctx = Arc::new(RequestContext::new(
        RequestId::new("local"),
        Some(UserId::new("user_123").unwrap()),
    ));
    let local = RpcClient::new(LocalLink::new(application().create_caller(ctx)));

    for (name, input) in [
        (GET_USERS, json!({})),
        (HELLO, json!({"text": "same"})),
        (WHOAMI, Value::Null),
    ] {
        assert_eq!(
            remote.query(name, input.clone()).await,
            local.query(name, input).await,
            "{name}"
        );
    }

    let remote_err = remote.query("missing", Value::Null).await.unwrap_err();
    let local_err = local.query("missing", Value::Null).await.unwrap_err();
    assert_eq!(remote_err.code, ErrorCode::NotFound);
    assert_eq!(remote_err.code, local_err.code);

    server.stop().await;
}

#[tokio::test]
async fn schema_errors_round_trip_as_bad_input() {
    let server = start_app_server().await;
    let err = server
        .rpc()
        .query(HELLO, json!({"text": 7}))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BadInput);
    server.stop().await;
}

#[tokio::test]
async fn batch_query_keeps_order_and_isolates_failures() {
    let server = start_app_server().await;
    let results = server
        .rpc()
        .batch_query([
            (GET_USERS, json!({})),
            ("missing", Value::Null),
            (HELLO, json!({"text": "b"})),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap(), &json!({}));
    assert_eq!(results[1].as_ref().unwrap_err().code, ErrorCode::NotFound);
    assert_eq!(results[2].as_ref().unwrap()["greeting"], "hello b");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_keep_their_identity() {
    let state = AppState::new(
        application(),
        Arc::new(AuthContextFactory::new(HeaderAuthProvider::new("x-user-id"))),
    );
    let server = start_server(state).await;

    let mut tasks = Vec::new();
    for i in 0..32 {
        let user = if i % 2 == 0 { "user1" } else { "user2" };
        let rpc = RpcClient::new(server.link().with_header("x-user-id", user));
        tasks.push(tokio::spawn(async move {
            (user, rpc.whoami().await.map(|out| out.user_id))
        }));
    }
    for task in tasks {
        let (expected, got) = task.await.unwrap();
        assert_eq!(got.unwrap(), expected);
    }

    let anonymous = server.rpc().whoami().await.unwrap_err();
    assert_eq!(anonymous.code, ErrorCode::Unauthenticated);
    assert_eq!(server.state.open_scopes(), 0);

    server.stop().await;
}

/// A tiny namespaced store: `users.list` reads, `users.add` writes.
fn user_store_router() -> Arc<switchyard_rpc::Router> {
    let store: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut users = RouterBuilder::new();

    let reader = Arc::clone(&store);
    users
        .register(query("list", move |_: Value, _ctx| {
            let names = reader.lock().unwrap().clone();
            async move { Ok::<_, RpcError>(names) }
        }))
        .unwrap();

    let writer = Arc::clone(&store);
    users
        .register(mutation("add", move |name: String, _ctx| {
            let mut names = writer.lock().unwrap();
            names.push(name);
            let count = names.len();
            async move { Ok::<_, RpcError>(count) }
        }))
        .unwrap();

    let mut root = RouterBuilder::new();
    root.merge("users", users).unwrap();
    Arc::new(root.build())
}

#[tokio::test]
async fn mutations_invalidate_their_namespace() {
    let server = start_server(AppState::new(user_store_router(), static_contexts())).await;
    let bridge = ClientBridge::new(make_query_client(QueryClientConfig::default()), server.rpc());
    let key = QueryKey::new("users.list", &Value::Null);

    assert_eq!(bridge.use_query("users.list", Value::Null).await.unwrap(), json!([]));
    assert!(!bridge.query_client().is_stale(&key));

    assert_eq!(bridge.mutate("users.add", json!("ann")).await.unwrap(), json!(1));
    assert!(bridge.query_client().is_stale(&key));

    assert_eq!(
        bridge.use_query("users.list", Value::Null).await.unwrap(),
        json!(["ann"])
    );

    server.stop().await;
}

#[tokio::test]
async fn fresh_reads_are_served_from_cache() {
    let server = start_server(AppState::new(user_store_router(), static_contexts())).await;
    let bridge = ClientBridge::new(make_query_client(QueryClientConfig::default()), server.rpc());
    let writer = server.rpc();

    assert_eq!(bridge.use_query("users.list", Value::Null).await.unwrap(), json!([]));
    // Written behind the bridge's back, so nothing invalidates the entry.
    writer.mutate("users.add", json!("bob")).await.unwrap();
    assert_eq!(bridge.use_query("users.list", Value::Null).await.unwrap(), json!([]));

    server.stop().await;
}

#[tokio::test]
async fn stopped_server_is_a_transport_error() {
    let server = start_app_server().await;
    let link: HttpLink = server.link();
    server.stop().await;

    let err = RpcClient::new(link).get_users().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Internal);
    assert!(err.message.starts_with("transport error"), "{}", err.message);
}
