//! Roadmap HTTP - REST transport for the sync layer
//!
//! Implements [`roadmap_sync::RemoteStore`] over the backend's JSON API:
//! - `POST /auth/login`, `POST /auth/register`
//! - `GET /surveys/responses`, `POST /surveys/responses/batch`
//! - `GET /todos`, `POST /todos`, `PUT /todos/{id}`

#![warn(unreachable_pub)]

pub mod client;
mod wire;

pub use client::HttpRemoteStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
