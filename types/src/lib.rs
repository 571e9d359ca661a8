//! Core domain types for Switchyard.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application: the router, the
//! HTTP transport, the query cache and the client bridge all speak these types.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod context;
mod error;
mod ids;
mod wire;

pub use context::{ProcedureKind, RequestContext, RequestMeta};
pub use error::{ErrorCode, RpcError, RpcResult};
pub use ids::{EmptyIdError, RequestId, UserId};
pub use wire::{ErrorBody, RequestEnvelope, ResponseEnvelope, SuccessBody};
