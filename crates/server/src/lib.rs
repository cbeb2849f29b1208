//! HTTP server exposing LuaRocks repositories.
//!
//! This crate provides:
//! - Artifact GET/PUT/DELETE per repository prefix
//! - Generated `manifest` files in Lua, JSON and zip form
//! - Health and Prometheus metrics endpoints
//! - Logging setup and storage bootstrap for the `mountain` binary

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod request_id;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use request_id::RequestId;
pub use routes::create_router;
pub use state::{AppState, RepositoryState};
