use std::sync::Arc;

use switchyard_rpc::{ContextArena, ContextFactory, Router};

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub(crate) router: Arc<Router>,
    pub(crate) contexts: Arc<dyn ContextFactory>,
    pub(crate) arena: ContextArena,
    pub(crate) base_path: String,
}

impl AppState {
    /// Mounted at the default base path, `/api/trpc`.
    #[must_use]
    pub fn new(router: Arc<Router>, contexts: Arc<dyn ContextFactory>) -> Self {
        Self {
            router,
            contexts,
            arena: ContextArena::new(),
            base_path: "/api/trpc".to_string(),
        }
    }

    /// `"/"` and `""` mount procedures at the root.
    #[must_use]
    pub fn with_base_path(mut self, base_path: &str) -> Self {
        let trimmed = base_path.trim().trim_matches('/');
        self.base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Scopes currently open, one per in-flight request.
    #[must_use]
    pub fn open_scopes(&self) -> usize {
        self.arena.len()
    }
}
