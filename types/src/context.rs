use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::ids::{RequestId, UserId};

/// Whether a procedure reads or writes.
///
/// Queries may be reached through GET (input in the URL) or POST; mutations only
/// through POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Query,
    Mutation,
}

impl ProcedureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
        }
    }
}

/// Per-request data threaded into every procedure invocation.
///
/// Created once per logical request and dropped with it. Never shared between
/// two requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: RequestId,
    user_id: Option<UserId>,
}

impl RequestContext {
    #[must_use]
    pub fn new(request_id: RequestId, user_id: Option<UserId>) -> Self {
        Self {
            request_id,
            user_id,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// The authenticated caller, or `unauthenticated`.
    pub fn require_user(&self) -> Result<&UserId, RpcError> {
        self.user_id
            .as_ref()
            .ok_or_else(|| RpcError::unauthenticated("caller is not signed in"))
    }
}

/// Inbound request metadata captured at the transport boundary.
///
/// Header names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    headers: Vec<(String, String)>,
}

impl RequestMeta {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.push_header(name, value);
        self
    }

    pub fn push_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
    }

    /// First value of `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}
