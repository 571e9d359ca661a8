//! In-process callers.
//!
//! Server-side code (render passes, background jobs, tests) invokes procedures
//! through a [`Caller`] bound to one [`RequestContext`]. Calls go through
//! [`Router::dispatch`] exactly like the HTTP path, minus serialization over
//! the wire.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use switchyard_types::{ProcedureKind, RequestContext, RpcError, RpcResult};

use crate::router::{Access, Router};

/// Produces callers over one shared router.
#[derive(Debug, Clone)]
pub struct CallerFactory {
    router: Arc<Router>,
}

impl CallerFactory {
    #[must_use]
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    #[must_use]
    pub fn create(&self, ctx: Arc<RequestContext>) -> Caller {
        Caller {
            router: Arc::clone(&self.router),
            ctx,
        }
    }

    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }
}

#[must_use]
pub fn create_caller_factory(router: Arc<Router>) -> CallerFactory {
    CallerFactory::new(router)
}

impl Router {
    /// Shorthand for `create_caller_factory(router).create(ctx)`.
    #[must_use]
    pub fn create_caller(self: &Arc<Self>, ctx: Arc<RequestContext>) -> Caller {
        Caller {
            router: Arc::clone(self),
            ctx,
        }
    }
}

/// A router bound to one request context.
#[derive(Debug, Clone)]
pub struct Caller {
    router: Arc<Router>,
    ctx: Arc<RequestContext>,
}

impl Caller {
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Bind a registered procedure by name.
    #[must_use]
    pub fn procedure<'a>(&'a self, name: &'a str) -> Option<BoundProcedure<'a>> {
        let kind = self.router.kind_of(name)?;
        Some(BoundProcedure {
            caller: self,
            name,
            kind,
        })
    }

    /// Raw JSON call. Queries and mutations are both allowed.
    pub async fn call(&self, name: &str, input: Value) -> RpcResult<Value> {
        self.router
            .dispatch(name, Access::Any, input, Arc::clone(&self.ctx))
            .await
    }

    /// Typed read. Refuses mutations the same way an HTTP GET would.
    pub async fn query<I, O>(&self, name: &str, input: &I) -> RpcResult<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let input = encode_input(input)?;
        let output = self
            .router
            .dispatch(name, Access::QueryOnly, input, Arc::clone(&self.ctx))
            .await?;
        decode_output(name, output)
    }

    /// Typed write.
    pub async fn mutate<I, O>(&self, name: &str, input: &I) -> RpcResult<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let input = encode_input(input)?;
        let output = self.call(name, input).await?;
        decode_output(name, output)
    }
}

/// A registered procedure bound to a caller's context.
#[derive(Debug, Clone, Copy)]
pub struct BoundProcedure<'a> {
    caller: &'a Caller,
    name: &'a str,
    kind: ProcedureKind,
}

impl BoundProcedure<'_> {
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    #[must_use]
    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }

    pub async fn call(&self, input: Value) -> RpcResult<Value> {
        self.caller.call(self.name, input).await
    }
}

fn encode_input<I: Serialize + ?Sized>(input: &I) -> RpcResult<Value> {
    serde_json::to_value(input).map_err(|e| RpcError::bad_input(e.to_string()))
}

fn decode_output<O: DeserializeOwned>(name: &str, output: Value) -> RpcResult<O> {
    serde_json::from_value(output)
        .map_err(|e| RpcError::internal(format!("unexpected output from '{name}': {e}")))
}
