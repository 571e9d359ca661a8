use std::sync::OnceLock;

use switchyard_config::SwitchyardConfig;
use switchyard_query::{QueryClient, QueryClientConfig, make_query_client};
use tracing::debug;

/// Where the calling code is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEnvironment {
    /// Per-request render pass. Must never share a cache with another request.
    Server,
    /// Long-lived interactive client. Keeps one cache for its whole lifetime.
    Browser,
}

/// Hands out query clients according to [`RenderEnvironment`].
#[derive(Debug)]
pub struct QueryClientProvider {
    config: QueryClientConfig,
    browser: OnceLock<QueryClient>,
}

impl Default for QueryClientProvider {
    fn default() -> Self {
        Self::new(QueryClientConfig::default())
    }
}

impl QueryClientProvider {
    #[must_use]
    pub fn new(config: QueryClientConfig) -> Self {
        Self {
            config,
            browser: OnceLock::new(),
        }
    }

    /// Clients honoring `[query] stale_time_ms`.
    #[must_use]
    pub fn from_config(config: &SwitchyardConfig) -> Self {
        Self::new(QueryClientConfig::default().with_stale_time(config.stale_time()))
    }

    /// `Server` gets a fresh client on every call; `Browser` gets the same one.
    #[must_use]
    pub fn get(&self, env: RenderEnvironment) -> QueryClient {
        match env {
            RenderEnvironment::Server => make_query_client(self.config.clone()),
            RenderEnvironment::Browser => self
                .browser
                .get_or_init(|| {
                    debug!("creating browser query client");
                    make_query_client(self.config.clone())
                })
                .clone(),
        }
    }
}

/// Process-wide [`QueryClientProvider::get`], configured from the config file
/// on first use.
#[must_use]
pub fn get_query_client(env: RenderEnvironment) -> QueryClient {
    static PROVIDER: OnceLock<QueryClientProvider> = OnceLock::new();
    PROVIDER
        .get_or_init(|| QueryClientProvider::from_config(&SwitchyardConfig::load_or_default()))
        .get(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use switchyard_query::QueryKey;

    #[test]
    fn server_clients_are_always_fresh() {
        let provider = QueryClientProvider::default();
        let a = provider.get(RenderEnvironment::Server);
        let b = provider.get(RenderEnvironment::Server);
        assert!(!a.ptr_eq(&b));
        a.set_query_data(QueryKey::without_input("getUsers"), json!({}));
        assert!(b.is_empty());
    }

    #[test]
    fn browser_client_is_a_singleton() {
        let provider = QueryClientProvider::default();
        let a = provider.get(RenderEnvironment::Browser);
        let b = provider.get(RenderEnvironment::Browser);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&provider.get(RenderEnvironment::Server)));
    }

    #[test]
    fn configured_stale_time_reaches_every_client() {
        let config = SwitchyardConfig::parse("[query]\nstale_time_ms = 1500\n").unwrap();
        let provider = QueryClientProvider::from_config(&config);
        for env in [RenderEnvironment::Server, RenderEnvironment::Browser] {
            assert_eq!(
                provider.get(env).config().stale_time,
                Duration::from_millis(1500)
            );
        }

        let client = provider.get(RenderEnvironment::Server);
        let key = QueryKey::without_input("getUsers");
        client.set_query_data(key.clone(), json!({}));
        let written = client.get_query_state(&key).unwrap().data_updated_at;
        assert!(!client.is_stale_at(&key, written + 1499));
        assert!(client.is_stale_at(&key, written + 1500));
    }

    #[test]
    fn global_provider_follows_same_rules() {
        assert!(get_query_client(RenderEnvironment::Browser)
            .ptr_eq(&get_query_client(RenderEnvironment::Browser)));
        assert!(!get_query_client(RenderEnvironment::Server)
            .ptr_eq(&get_query_client(RenderEnvironment::Server)));
    }
}
