//! API Module
//!
//! HTTP handlers and routing for the image cache REST API.
//!
//! # Endpoints
//! - `POST /cache/download` - Resolve a URL to a cached file
//! - `POST /cache/seed` - Seed the cache from a local file
//! - `DELETE /cache/entry` - Delete one cached URL
//! - `DELETE /cache` - Clear the cache
//! - `GET /cache/info` - Inspect the cache directory
//! - `GET /stats` - Engine statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
