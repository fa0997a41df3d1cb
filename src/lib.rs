//! # Gatehouse
//!
//! Session and credential authentication with resource-scoped permissions,
//! for putting in front of an experiment tracking server. Usable both as a
//! standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! gatehouse = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gatehouse::config::AuthConfig;
//! use gatehouse::server::{AppState, create_router};
//! use gatehouse::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/gatehouse.db").unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), AuthConfig::default()));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! Every request passes through the [`pipeline`]: it is classified against
//! an operation table, authenticated by session cookie or Basic credentials,
//! and authorized against per-resource grants before any handler runs.
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `gatehouse` binary. Disable with `default-features = false`.

pub mod accounts;
pub mod auth;
pub mod authz;
pub mod clock;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod types;
pub mod validation;
