//! Keyed query cache for Switchyard.
//!
//! A [`QueryClient`] caches procedure results under a [`QueryKey`] (procedure
//! path plus canonical input). Entries go stale after the configured window,
//! can be invalidated by path prefix, and can be shipped from a server render
//! pass to a long-lived client with [`QueryClient::dehydrate`] and
//! [`QueryClient::hydrate`].

mod client;
mod dehydrate;
mod key;
mod state;

pub use client::{
    DEFAULT_STALE_TIME, QueryClient, QueryClientConfig, ShouldDehydrate,
    default_should_dehydrate_query, dehydrate_success_or_pending, make_query_client,
};
pub use dehydrate::{DehydratedQuery, DehydratedState};
pub use key::{QueryKey, canonical_json};
pub use state::{QueryState, QueryStatus, now_ms};
