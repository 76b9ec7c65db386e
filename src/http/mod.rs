//! HTTP server module with optional TLS.
//!
//! Two modes are supported:
//! - **None** (default): Plain HTTP, for local development or behind a reverse proxy
//! - **Manual**: User-provided certificate and key files
//!
//! The server shuts down gracefully on SIGTERM/SIGINT and, in manual TLS mode,
//! reloads certificates on SIGHUP.

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
