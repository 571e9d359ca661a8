//! Request contexts.
//!
//! A [`ContextFactory`] turns transport metadata into a [`RequestContext`].
//! The [`ContextArena`] makes sure that within one logical request the factory
//! runs at most once, and that no two requests ever see the same context.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use switchyard_types::{RequestContext, RequestId, RequestMeta, RpcError, RpcResult, UserId};
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

pub type ContextFut<'a> = Pin<Box<dyn Future<Output = RpcResult<RequestContext>> + Send + 'a>>;
pub type AuthFut<'a> = Pin<Box<dyn Future<Output = RpcResult<Option<UserId>>> + Send + 'a>>;

/// Builds the context for one request.
pub trait ContextFactory: Send + Sync {
    fn create<'a>(&'a self, meta: &'a RequestMeta, request_id: RequestId) -> ContextFut<'a>;
}

/// Fresh UUID v4 request id.
#[must_use]
pub fn new_request_id() -> RequestId {
    RequestId::new(Uuid::new_v4().to_string())
}

/// Every request runs as the same fixed identity (or as nobody).
#[derive(Debug, Clone)]
pub struct StaticContextFactory {
    user_id: Option<UserId>,
}

impl StaticContextFactory {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

impl ContextFactory for StaticContextFactory {
    fn create<'a>(&'a self, _meta: &'a RequestMeta, request_id: RequestId) -> ContextFut<'a> {
        let user_id = self.user_id.clone();
        Box::pin(async move { Ok(RequestContext::new(request_id, user_id)) })
    }
}

/// Answers "who is calling" from request metadata.
///
/// `Ok(None)` means anonymous; `Err` aborts the request.
pub trait AuthProvider: Send + Sync {
    fn authenticate<'a>(&'a self, meta: &'a RequestMeta) -> AuthFut<'a>;
}

/// Trusts a header set by an upstream proxy.
#[derive(Debug, Clone)]
pub struct HeaderAuthProvider {
    header: String,
}

impl HeaderAuthProvider {
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
        }
    }

    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl AuthProvider for HeaderAuthProvider {
    fn authenticate<'a>(&'a self, meta: &'a RequestMeta) -> AuthFut<'a> {
        Box::pin(async move {
            match meta.header(&self.header).map(str::trim) {
                None | Some("") => Ok(None),
                Some(value) => UserId::new(value)
                    .map(Some)
                    .map_err(|e| RpcError::unauthenticated(e.to_string())),
            }
        })
    }
}

/// Context factory backed by an [`AuthProvider`].
#[derive(Debug, Clone)]
pub struct AuthContextFactory<A> {
    provider: A,
}

impl<A: AuthProvider> AuthContextFactory<A> {
    #[must_use]
    pub fn new(provider: A) -> Self {
        Self { provider }
    }
}

impl<A: AuthProvider> ContextFactory for AuthContextFactory<A> {
    fn create<'a>(&'a self, meta: &'a RequestMeta, request_id: RequestId) -> ContextFut<'a> {
        Box::pin(async move {
            let user_id = self.provider.authenticate(meta).await?;
            Ok(RequestContext::new(request_id, user_id))
        })
    }
}

type Slot = Arc<OnceCell<Arc<RequestContext>>>;

/// Request-scoped memoization of contexts, keyed by request id.
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct ContextArena {
    slots: Arc<Mutex<HashMap<RequestId, Slot>>>,
}

impl ContextArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope for a new logical request.
    #[must_use]
    pub fn scope(&self) -> RequestScope {
        self.scope_with_id(new_request_id())
    }

    /// Open (or join) the scope for `request_id`.
    #[must_use]
    pub fn scope_with_id(&self, request_id: RequestId) -> RequestScope {
        let slot = Arc::clone(
            self.lock()
                .entry(request_id.clone())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );
        RequestScope {
            request_id,
            slot,
            arena: self.clone(),
        }
    }

    /// Live scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One logical request's handle on the arena. Dropping the last handle for a
/// request id evicts its context.
#[derive(Debug)]
pub struct RequestScope {
    request_id: RequestId,
    slot: Slot,
    arena: ContextArena,
}

impl RequestScope {
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Context for this request; the factory runs at most once per scope.
    ///
    /// Concurrent callers wait for the first one. A failed build is not cached.
    pub async fn context<F>(&self, factory: &F, meta: &RequestMeta) -> RpcResult<Arc<RequestContext>>
    where
        F: ContextFactory + ?Sized,
    {
        let ctx = self
            .slot
            .get_or_try_init(|| async {
                debug!(request_id = %self.request_id, "building request context");
                factory
                    .create(meta, self.request_id.clone())
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(ctx))
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        let mut slots = self.arena.lock();
        let last_holder = slots
            .get(&self.request_id)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2);
        if last_holder {
            slots.remove(&self.request_id);
        }
    }
}
