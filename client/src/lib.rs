//! Client side of Switchyard.
//!
//! | Piece | Purpose |
//! |-------|---------|
//! | [`RenderEnvironment`], [`QueryClientProvider`] | Pick a query cache for the current render |
//! | [`Link`], [`HttpLink`], [`LocalLink`] | Move operations to a router, over HTTP or in-process |
//! | [`RpcClient`] | Typed proxy over a link |
//! | [`ClientBridge`] | Query cache plus proxy: cached reads, invalidating writes |

mod bridge;
mod environment;
mod http;
mod link;
mod proxy;

pub use bridge::ClientBridge;
pub use environment::{QueryClientProvider, RenderEnvironment, get_query_client};
pub use http::HttpLink;
pub use link::{Link, LinkFut, LocalLink, Operation};
pub use proxy::RpcClient;

pub use switchyard_query;
