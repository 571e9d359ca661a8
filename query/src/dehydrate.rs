//! Moving cache contents between a server render pass and a long-lived client.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::QueryClient;
use crate::key::QueryKey;
use crate::state::{QueryState, QueryStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DehydratedQuery {
    pub key: QueryKey,
    pub state: QueryState,
}

/// Serializable snapshot of selected cache entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DehydratedState {
    pub queries: Vec<DehydratedQuery>,
}

impl DehydratedState {
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<&QueryState> {
        self.queries.iter().find(|q| &q.key == key).map(|q| &q.state)
    }
}

impl QueryClient {
    /// Snapshot entries accepted by the client's `should_dehydrate_query`.
    /// Error entries are never included. Output is sorted by key.
    #[must_use]
    pub fn dehydrate(&self) -> DehydratedState {
        let predicate = &self.config().should_dehydrate_query;
        let mut queries: Vec<_> = self
            .read()
            .iter()
            .filter(|(key, state)| state.status != QueryStatus::Error && predicate(*key, *state))
            .map(|(key, state)| DehydratedQuery {
                key: key.clone(),
                state: state.clone(),
            })
            .collect();
        queries.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(count = queries.len(), "dehydrated queries");
        DehydratedState { queries }
    }

    /// Merge a snapshot into this cache. Returns how many entries were written.
    ///
    /// Existing entries are only replaced by strictly newer data. Error entries
    /// are skipped, and a pending entry never overwrites existing data.
    pub fn hydrate(&self, snapshot: DehydratedState) -> usize {
        let mut cache = self.write();
        let mut written = 0;
        for DehydratedQuery { key, state } in snapshot.queries {
            if state.status == QueryStatus::Error {
                continue;
            }
            let replace = match cache.get(&key) {
                None => true,
                Some(existing) if state.status == QueryStatus::Pending => !existing.has_data(),
                Some(existing) => {
                    !existing.has_data() || state.data_updated_at > existing.data_updated_at
                }
            };
            if replace {
                cache.insert(key, state);
                written += 1;
            }
        }
        debug!(written, "hydrated queries");
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{QueryClientConfig, default_should_dehydrate_query, make_query_client};
    use serde_json::json;
    use switchyard_types::RpcError;

    fn key(path: &str) -> QueryKey {
        QueryKey::without_input(path)
    }

    fn seeded(config: QueryClientConfig) -> QueryClient {
        let client = make_query_client(config);
        client.set_query_data(key("ok"), json!({}));
        {
            let mut cache = client.write();
            cache.insert(key("loading"), QueryState::pending());
            let mut failed = QueryState::pending();
            failed.record_error(RpcError::internal("boom"), 1);
            cache.insert(key("failed"), failed);
        }
        client
    }

    #[test]
    fn default_includes_success_and_pending_only() {
        let state = seeded(QueryClientConfig::default()).dehydrate();
        assert_eq!(state.len(), 2);
        assert!(state.get(&key("ok")).is_some());
        assert!(state.get(&key("loading")).is_some());
        assert!(state.get(&key("failed")).is_none());
    }

    #[test]
    fn library_default_predicate_is_success_only() {
        let config = QueryClientConfig::default().with_should_dehydrate(default_should_dehydrate_query);
        let state = seeded(config).dehydrate();
        assert_eq!(state.len(), 1);
        assert!(state.get(&key("ok")).is_some());
    }

    #[test]
    fn errors_excluded_even_when_predicate_accepts_all() {
        let config = QueryClientConfig::default().with_should_dehydrate(|_, _| true);
        let state = seeded(config).dehydrate();
        assert!(state.get(&key("failed")).is_none());
    }

    #[test]
    fn snapshot_survives_serde() {
        let state = seeded(QueryClientConfig::default()).dehydrate();
        let text = serde_json::to_string(&state).unwrap();
        let back: DehydratedState = serde_json::from_str(&text).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn hydrate_into_empty_client() {
        let server = seeded(QueryClientConfig::default());
        let browser = make_query_client(QueryClientConfig::default());
        assert_eq!(browser.hydrate(server.dehydrate()), 2);
        assert_eq!(browser.get_query_data(&key("ok")), Some(json!({})));
        assert!(!browser.is_stale(&key("ok")));
    }

    #[test]
    fn hydrate_keeps_newer_local_data() {
        let browser = QueryClient::default();
        browser.set_query_data(key("ok"), json!("local"));
        let local_at = browser.get_query_state(&key("ok")).unwrap().data_updated_at;

        let older = DehydratedState {
            queries: vec![DehydratedQuery {
                key: key("ok"),
                state: QueryState::success(json!("server"), local_at.saturating_sub(1)),
            }],
        };
        assert_eq!(browser.hydrate(older), 0);
        assert_eq!(browser.get_query_data(&key("ok")), Some(json!("local")));

        let newer = DehydratedState {
            queries: vec![DehydratedQuery {
                key: key("ok"),
                state: QueryState::success(json!("server"), local_at + 1),
            }],
        };
        assert_eq!(browser.hydrate(newer), 1);
        assert_eq!(browser.get_query_data(&key("ok")), Some(json!("server")));
    }

    #[test]
    fn pending_never_erases_data() {
        let browser = QueryClient::default();
        browser.set_query_data(key("ok"), json!("local"));
        let incoming = DehydratedState {
            queries: vec![DehydratedQuery {
                key: key("ok"),
                state: QueryState::pending(),
            }],
        };
        assert_eq!(browser.hydrate(incoming), 0);
        assert_eq!(browser.get_query_data(&key("ok")), Some(json!("local")));
    }

    #[test]
    fn error_entries_are_not_hydrated() {
        let mut failed = QueryState::pending();
        failed.record_error(RpcError::internal("boom"), 5);
        let incoming = DehydratedState {
            queries: vec![DehydratedQuery {
                key: key("failed"),
                state: failed,
            }],
        };
        let browser = QueryClient::default();
        assert_eq!(browser.hydrate(incoming), 0);
        assert!(browser.is_empty());
    }
}
