//! REST API for the bot flow engine.
//!
//! Exposes flow CRUD, node editing (single and bulk), relinking,
//! duplication, and the publish lifecycle over HTTP, wrapping every
//! response in the `{success, data, timestamp}` envelope.

pub mod config;
pub mod response;
pub mod routes;

pub use config::ApiConfig;
pub use routes::{router, AppState};
