//! HTTP transport adapter for Switchyard.
//!
//! ```text
//! GET  {base}/{procedure}?input=<json>        queries only
//! POST {base}/{procedure}   {"input": ..}      queries and mutations
//! GET|POST {base}/{a,b}?batch=1                 batched calls, one request scope
//! GET  /health
//! ```
//!
//! Responses use the envelopes in `switchyard_types::wire`; the HTTP status
//! always matches the error code.

mod handlers;
mod sanitize;
mod state;

use std::future::Future;
use std::io;

use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

pub use handlers::MAX_BATCH_CALLS;
pub use sanitize::{GENERIC_INTERNAL_MESSAGE, panic_message, sanitize_for_client};
pub use state::AppState;

/// Build the axum application for `state`.
pub fn build_app(state: AppState) -> axum::Router {
    let route = format!("{}/{{procedure}}", state.base_path());
    axum::Router::new()
        .route("/health", get(handlers::health))
        .route(&route, get(handlers::handle_get).post(handlers::handle_post))
        .fallback(handlers::fallback)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(
        %addr,
        base_path = state.base_path(),
        procedures = state.router().len(),
        "switchyard listening"
    );
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("switchyard stopped");
    Ok(())
}
