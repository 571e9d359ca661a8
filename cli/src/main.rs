//! Switchyard CLI - binary entry point for the RPC server.
//!
//! ```text
//! main() -> SwitchyardConfig::load() -> init_tracing(filter)
//!        -> app_router() + context_factory(auth mode)
//!        -> TcpListener::bind(bind:port) -> switchyard_server::serve(.., ctrl_c)
//! ```
//!
//! Config problems never stop the server: they are reported once logging is
//! up and the defaults are used instead.

use std::future::{Future, pending};
use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use switchyard_config::{AuthMode, DEFAULT_LOG_FILTER, SwitchyardConfig};
use switchyard_rpc::{
    AuthContextFactory, ContextFactory, HeaderAuthProvider, StaticContextFactory, app_router,
};
use switchyard_server::{AppState, serve};
use switchyard_types::UserId;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, init_warnings) = load_config();
    init_tracing(&config.log_filter());
    for warning in init_warnings {
        warn!("{warning}");
    }

    let router = Arc::new(app_router().context("failed to build application router")?);
    let contexts = context_factory(&config)?;
    let state = AppState::new(router, contexts).with_base_path(&config.base_path());

    let bind = config.bind();
    let port = config.port();
    let listener = TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;

    serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

/// `RUST_LOG` wins over the config filter; a bad filter falls back to `info`.
fn init_tracing(config_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

/// Config plus the warnings to emit once the subscriber exists.
fn load_config() -> (SwitchyardConfig, Vec<String>) {
    match SwitchyardConfig::load() {
        Ok(Some(config)) => (config, Vec::new()),
        Ok(None) => (SwitchyardConfig::default(), Vec::new()),
        Err(err) => (
            SwitchyardConfig::default(),
            vec![format!("{err}; using defaults")],
        ),
    }
}

fn context_factory(config: &SwitchyardConfig) -> Result<Arc<dyn ContextFactory>> {
    match config.auth_mode() {
        AuthMode::Static => {
            let user = UserId::new(config.static_user_id()).context("invalid static_user_id")?;
            info!(user = %user, "auth: static identity");
            Ok(Arc::new(StaticContextFactory::new(user)))
        }
        AuthMode::Header => {
            let header = config.auth_header();
            info!(header = %header, "auth: trusted header");
            Ok(Arc::new(AuthContextFactory::new(HeaderAuthProvider::new(
                header,
            ))))
        }
    }
}

fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    async {
        match signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => {
                warn!("failed to listen for ctrl-c: {e}");
                pending::<()>().await;
            }
        }
    }
}
