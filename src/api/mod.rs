//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `GET /cache/:key` - Read a value
//! - `PUT /cache/:key` - Store a value
//! - `POST /cache/:key` - Get or set a value
//! - `DELETE /cache/:key` - Remove a value
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
