//! Shared test utilities and fixtures
//!
//! Every helper here talks to a real server on a loopback port.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;

use switchyard_client::{HttpLink, RpcClient};
use switchyard_rpc::{ContextFactory, Router, StaticContextFactory, app_router};
use switchyard_server::{AppState, serve};
use switchyard_types::UserId;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const BASE_PATH: &str = "/api/trpc";

/// A running server plus the handle needed to stop it.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<io::Result<()>>,
}

impl TestServer {
    /// Client for this server over HTTP.
    pub fn rpc(&self) -> RpcClient {
        RpcClient::new(self.link())
    }

    pub fn link(&self) -> HttpLink {
        HttpLink::new(&self.base_url, self.state.base_path()).expect("valid base url")
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle
            .await
            .expect("server task panicked")
            .expect("server failed");
    }
}

/// The application router as the binary builds it.
pub fn application() -> Arc<Router> {
    Arc::new(app_router().expect("application router builds"))
}

/// Every request runs as `user_123`.
pub fn static_contexts() -> Arc<dyn ContextFactory> {
    Arc::new(StaticContextFactory::new(
        UserId::new("user_123").expect("non-empty"),
    ))
}

pub async fn start_app_server() -> TestServer {
    start_server(AppState::new(application(), static_contexts())).await
}

pub async fn start_server(state: AppState) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(serve(listener, state.clone(), async move {
        let _ = rx.await;
    }));
    TestServer {
        base_url: format!("http://{addr}"),
        state,
        shutdown: Some(tx),
        handle,
    }
}
