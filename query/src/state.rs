use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchyard_types::RpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// No data yet; a fetch is in flight or has not started.
    Pending,
    Success,
    Error,
}

/// State of one cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    pub status: QueryStatus,
    pub data: Option<Value>,
    pub error: Option<RpcError>,
    /// Unix millis of the last successful write; 0 when never written.
    pub data_updated_at: u64,
    pub error_updated_at: u64,
    pub is_invalidated: bool,
}

impl QueryState {
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
            data_updated_at: 0,
            error_updated_at: 0,
            is_invalidated: false,
        }
    }

    #[must_use]
    pub fn success(data: Value, updated_at: u64) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
            data_updated_at: updated_at,
            error_updated_at: 0,
            is_invalidated: false,
        }
    }

    pub(crate) fn record_success(&mut self, data: Value, at: u64) {
        self.status = QueryStatus::Success;
        self.data = Some(data);
        self.error = None;
        self.data_updated_at = at;
        self.is_invalidated = false;
    }

    /// Previous data stays readable after a failed refetch.
    pub(crate) fn record_error(&mut self, error: RpcError, at: u64) {
        self.status = QueryStatus::Error;
        self.error = Some(error);
        self.error_updated_at = at;
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Stale when there is no data, the entry was invalidated, or the data is
    /// at least `stale_time` old at `now` (unix millis).
    #[must_use]
    pub fn is_stale_at(&self, stale_time: Duration, now: u64) -> bool {
        if self.data.is_none() || self.is_invalidated {
            return true;
        }
        let age = now.saturating_sub(self.data_updated_at);
        u128::from(age) >= stale_time.as_millis()
    }
}

/// Current time in unix millis.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
