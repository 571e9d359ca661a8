//! Procedure definitions.
//!
//! A procedure is a named unit of server logic: an optional JSON Schema for its
//! input and an async handler closed over the request context. Most procedures
//! are built with [`query`] or [`mutation`] from a typed async function; the
//! [`Procedure`] trait is the seam for anything that needs raw JSON.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use switchyard_types::{ProcedureKind, RequestContext, RpcError, RpcResult};

/// Procedure execution future type alias.
pub type ProcedureFut<'a> = Pin<Box<dyn Future<Output = RpcResult<Value>> + Send + 'a>>;

/// A named, independently invokable unit of server logic.
pub trait Procedure: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ProcedureKind;
    /// JSON Schema the raw input must satisfy before `call` runs.
    fn input_schema(&self) -> Option<&Value> {
        None
    }
    /// Whether dispatch must reject callers without an identity.
    fn requires_auth(&self) -> bool {
        false
    }
    fn call(&self, input: Value, ctx: Arc<RequestContext>) -> ProcedureFut<'_>;
}

/// Procedure backed by a typed async function.
pub struct FnProcedure<I, O, F> {
    name: String,
    kind: ProcedureKind,
    schema: Option<Value>,
    requires_auth: bool,
    handler: F,
    _marker: PhantomData<fn(I) -> O>,
}

/// Define a read-only procedure.
pub fn query<I, O, F, Fut>(name: impl Into<String>, handler: F) -> FnProcedure<I, O, F>
where
    F: Fn(I, Arc<RequestContext>) -> Fut,
    Fut: Future<Output = RpcResult<O>>,
{
    FnProcedure::new(name, ProcedureKind::Query, handler)
}

/// Define a procedure with side effects.
pub fn mutation<I, O, F, Fut>(name: impl Into<String>, handler: F) -> FnProcedure<I, O, F>
where
    F: Fn(I, Arc<RequestContext>) -> Fut,
    Fut: Future<Output = RpcResult<O>>,
{
    FnProcedure::new(name, ProcedureKind::Mutation, handler)
}

impl<I, O, F> FnProcedure<I, O, F> {
    fn new(name: impl Into<String>, kind: ProcedureKind, handler: F) -> Self {
        Self {
            name: name.into(),
            kind,
            schema: None,
            requires_auth: false,
            handler,
            _marker: PhantomData,
        }
    }

    /// Validate raw input against `schema` before deserializing it.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Require an authenticated caller.
    #[must_use]
    pub fn protected(mut self) -> Self {
        self.requires_auth = true;
        self
    }
}

impl<I, O, F, Fut> Procedure for FnProcedure<I, O, F>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + 'static,
    F: Fn(I, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<O>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProcedureKind {
        self.kind
    }

    fn input_schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    fn call(&self, input: Value, ctx: Arc<RequestContext>) -> ProcedureFut<'_> {
        Box::pin(async move {
            let input: I = parse_input(input)?;
            let output = (self.handler)(input, ctx).await?;
            serde_json::to_value(output)
                .map_err(|e| RpcError::internal(format!("failed to serialize output: {e}")))
        })
    }
}

pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> RpcResult<T> {
    serde_json::from_value(input).map_err(|e| RpcError::bad_input(e.to_string()))
}

/// Compile a schema once so dispatch does not rebuild it per call.
pub(crate) fn compile_schema(schema: &Value) -> Result<jsonschema::Validator, String> {
    jsonschema::validator_for(schema).map_err(|e| e.to_string())
}

/// Validate input against a compiled schema.
pub(crate) fn validate_input(validator: &jsonschema::Validator, input: &Value) -> RpcResult<()> {
    validator
        .validate(input)
        .map_err(|err| RpcError::bad_input(err.to_string()))
}
