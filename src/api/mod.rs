//! API Module
//!
//! HTTP handlers and routing that expose the cache facade over REST.
//!
//! # Endpoints
//! - `GET /health` - Backend name and connectivity
//! - `PUT /cache/:key` - Store a value
//! - `GET /cache/:key` - Retrieve a value
//! - `DELETE /cache/:key` - Delete a value
//! - `GET /cache/:key/exists` - Check for a live value
//! - `POST /cache/:key/remember` - Read-through store
//! - `DELETE /cache` - Flush everything

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
