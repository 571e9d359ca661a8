//! Router registration and dispatch.
//!
//! A [`RouterBuilder`] collects procedures, rejecting duplicate names, and
//! [`RouterBuilder::build`] freezes them into an immutable [`Router`] that is
//! shared (as `Arc<Router>`) by every request for the life of the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use switchyard_types::{ProcedureKind, RequestContext, RpcError, RpcResult};
use thiserror::Error;
use tracing::{debug, warn};

use crate::procedure::{Procedure, compile_schema, validate_input};

/// Errors raised while assembling a router. These are configuration bugs and
/// surface at startup, never per request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterBuildError {
    #[error("Duplicate procedure registered: {name}")]
    DuplicateProcedure { name: String },
    #[error("Invalid procedure name: {name:?}")]
    InvalidName { name: String },
    #[error("Invalid input schema for {name}: {message}")]
    InvalidSchema { name: String, message: String },
}

/// What the inbound call path is allowed to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read-only transport (HTTP GET): mutations are refused.
    QueryOnly,
    /// POST or in-process callers.
    Any,
}

struct Entry {
    procedure: Arc<dyn Procedure>,
    validator: Option<Arc<jsonschema::Validator>>,
}

#[derive(Default)]
pub struct RouterBuilder {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl RouterBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a procedure under its own name.
    pub fn register(&mut self, procedure: impl Procedure + 'static) -> Result<(), RouterBuildError> {
        let procedure: Arc<dyn Procedure> = Arc::new(procedure);
        let name = procedure.name().to_string();
        self.insert(name, procedure)
    }

    /// Chaining form of [`register`](Self::register).
    pub fn procedure(
        mut self,
        procedure: impl Procedure + 'static,
    ) -> Result<Self, RouterBuildError> {
        self.register(procedure)?;
        Ok(self)
    }

    /// Nest every procedure of `other` under `prefix.`.
    pub fn merge(&mut self, prefix: &str, other: RouterBuilder) -> Result<(), RouterBuildError> {
        let prefix = prefix.trim_matches('.');
        if prefix.is_empty() || !is_valid_name(prefix) {
            return Err(RouterBuildError::InvalidName {
                name: prefix.to_string(),
            });
        }
        let RouterBuilder { order, mut entries } = other;
        for name in order {
            if let Some(entry) = entries.remove(&name) {
                self.insert_entry(format!("{prefix}.{name}"), entry)?;
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        name: String,
        procedure: Arc<dyn Procedure>,
    ) -> Result<(), RouterBuildError> {
        if !is_valid_name(&name) {
            return Err(RouterBuildError::InvalidName { name });
        }
        let validator = match procedure.input_schema() {
            Some(schema) => Some(Arc::new(compile_schema(schema).map_err(|message| {
                RouterBuildError::InvalidSchema {
                    name: name.clone(),
                    message,
                }
            })?)),
            None => None,
        };
        self.insert_entry(
            name,
            Entry {
                procedure,
                validator,
            },
        )
    }

    fn insert_entry(&mut self, name: String, entry: Entry) -> Result<(), RouterBuildError> {
        if self.entries.contains_key(&name) {
            return Err(RouterBuildError::DuplicateProcedure { name });
        }
        self.order.push(name.clone());
        self.entries.insert(name, entry);
        Ok(())
    }

    #[must_use]
    pub fn build(self) -> Router {
        debug!(procedure_count = self.order.len(), "router built");
        Router {
            order: self.order,
            entries: self.entries,
        }
    }
}

/// Procedure names are non-empty and may not contain `,` (the batch separator)
/// or `/` (the URL path separator).
fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name
            .chars()
            .any(|c| c == ',' || c == '/' || c.is_whitespace())
}

/// Immutable mapping from procedure name to definition.
pub struct Router {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("procedures", &self.order)
            .finish()
    }
}

impl Router {
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Registered names, in registration order.
    pub fn procedure_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<ProcedureKind> {
        self.entries.get(name).map(|e| e.procedure.kind())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolve `name` and run it with `ctx`.
    ///
    /// Checks run in order: lookup (`not_found`), access (`method_not_supported`),
    /// input schema (`bad_input`), identity (`unauthenticated`).
    pub async fn dispatch(
        &self,
        name: &str,
        access: Access,
        input: Value,
        ctx: Arc<RequestContext>,
    ) -> RpcResult<Value> {
        let Some(entry) = self.entries.get(name) else {
            warn!(procedure = name, request_id = %ctx.request_id(), "unknown procedure");
            return Err(RpcError::not_found(format!("no procedure named '{name}'")));
        };
        let kind = entry.procedure.kind();

        if access == Access::QueryOnly && kind == ProcedureKind::Mutation {
            return Err(RpcError::method_not_supported(format!(
                "'{name}' is a mutation and must be called with POST"
            )));
        }

        if let Some(validator) = &entry.validator {
            validate_input(validator, &input)?;
        }

        if entry.procedure.requires_auth() {
            ctx.require_user()?;
        }

        debug!(
            procedure = name,
            kind = kind.as_str(),
            request_id = %ctx.request_id(),
            "dispatching procedure"
        );

        let result = entry.procedure.call(input, Arc::clone(&ctx)).await;
        if let Err(err) = &result {
            warn!(
                procedure = name,
                request_id = %ctx.request_id(),
                code = err.code.as_str(),
                "procedure failed: {}",
                err.message
            );
        }
        result
    }
}
