use serde::de::DeserializeOwned;
use serde_json::Value;
use switchyard_query::{DehydratedState, QueryClient, QueryKey};
use switchyard_types::{RpcError, RpcResult};
use tracing::debug;

use crate::environment::{RenderEnvironment, get_query_client};
use crate::proxy::RpcClient;

/// A query cache paired with an RPC client.
///
/// Reads go through the cache; writes go straight to the link and then
/// invalidate the cached reads they may have changed.
#[derive(Debug, Clone)]
pub struct ClientBridge {
    queries: QueryClient,
    rpc: RpcClient,
}

impl ClientBridge {
    #[must_use]
    pub fn new(queries: QueryClient, rpc: RpcClient) -> Self {
        Self { queries, rpc }
    }

    /// Bridge over the process-wide query client for `env`.
    #[must_use]
    pub fn for_environment(env: RenderEnvironment, rpc: RpcClient) -> Self {
        Self::new(get_query_client(env), rpc)
    }

    #[must_use]
    pub fn query_client(&self) -> &QueryClient {
        &self.queries
    }

    #[must_use]
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Cached read of `name(input)`.
    pub async fn use_query(&self, name: &str, input: Value) -> RpcResult<Value> {
        let key = QueryKey::new(name, &input);
        self.queries
            .fetch_query(key, || self.rpc.query(name, input))
            .await
    }

    pub async fn use_query_as<O: DeserializeOwned>(&self, name: &str, input: Value) -> RpcResult<O> {
        let value = self.use_query(name, input).await?;
        serde_json::from_value(value)
            .map_err(|e| RpcError::internal(format!("unexpected output from '{name}': {e}")))
    }

    /// Warm the cache for `name(input)`; failures are recorded, not returned.
    pub async fn prefetch(&self, name: &str, input: Value) {
        let key = QueryKey::new(name, &input);
        self.queries
            .prefetch_query(key, || self.rpc.query(name, input))
            .await;
    }

    /// Run a mutation, then invalidate every cached query in its namespace.
    ///
    /// `users.create` invalidates `users.*`; a top-level mutation invalidates
    /// the whole cache.
    pub async fn mutate(&self, name: &str, input: Value) -> RpcResult<Value> {
        let output = self.rpc.mutate(name, input).await?;
        let prefix = namespace_of(name);
        let count = self.queries.invalidate_queries(prefix);
        debug!(procedure = name, prefix, count, "invalidated after mutation");
        Ok(output)
    }

    #[must_use]
    pub fn dehydrate(&self) -> DehydratedState {
        self.queries.dehydrate()
    }

    pub fn hydrate(&self, state: DehydratedState) -> usize {
        self.queries.hydrate(state)
    }
}

fn namespace_of(name: &str) -> &str {
    name.rsplit_once('.').map_or("", |(ns, _)| ns)
}
