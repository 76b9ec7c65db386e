//! ordo-site: health reporting and deployment verification.
//!
//! Serves `/api/health` and `/api/deployment-status` for the Ordo marketing
//! site, and provides the development-only deploy banner that hides itself
//! once production is confirmed to run this application.

pub mod banner;
pub mod config;
pub mod deployment;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod templates;

pub use error::AppError;
