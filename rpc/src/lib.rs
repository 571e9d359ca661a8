//! Procedure router for Switchyard.
//!
//! # Architecture
//!
//! ```text
//!   HTTP transport ──┐                        ┌── Caller (in-process)
//!                    ▼                        ▼
//!              ContextArena::scope()    Router::create_caller(ctx)
//!                    │                        │
//!                    └──────► Router::dispatch ◄┘
//!                                   │
//!                       lookup → access → schema → auth → handler
//! ```
//!
//! Both call paths end in [`Router::dispatch`], so procedure behavior has exactly
//! one source of truth.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`procedure`] | `Procedure` trait and typed `query`/`mutation` handlers |
//! | [`router`] | Registration (duplicate names rejected) and dispatch |
//! | [`caller`] | Local caller: direct invocation without a network hop |
//! | [`context`] | Context factories, auth providers, request-scoped memoization |
//! | [`app`] | The application's procedures |

pub mod app;
pub mod caller;
pub mod context;
pub mod procedure;
pub mod router;

pub use app::{GET_USERS, HELLO, HelloInput, HelloOutput, WHOAMI, WhoAmIOutput, app_router};
pub use caller::{BoundProcedure, Caller, CallerFactory, create_caller_factory};
pub use context::{
    AuthContextFactory, AuthFut, AuthProvider, ContextArena, ContextFactory, ContextFut,
    HeaderAuthProvider, RequestScope, StaticContextFactory, new_request_id,
};
pub use procedure::{FnProcedure, Procedure, ProcedureFut, mutation, query};
pub use router::{Access, Router, RouterBuildError, RouterBuilder};

pub use switchyard_types;
