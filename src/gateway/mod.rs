//! Local HTTP gateway: bundled web UI plus a prefix-stripping proxy to the
//! inference service.

mod route;
mod router;
mod server;

pub use route::{RouteRule, DEFAULT_PROXY_PREFIX, DEFAULT_UPSTREAM_ORIGIN};
pub use router::{build_router, PROXY_BODY_LIMIT};
pub use server::GatewayServer;
