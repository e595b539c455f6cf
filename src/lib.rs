//! Toolhub - tool marketplace backend
//!
//! Catalogues third-party tools submitted by companies, moderates them,
//! and serves ratings, threaded comments, media and view analytics.

pub mod account;
pub mod admin;
pub mod aggregates;
pub mod analytics;
pub mod api;
pub mod auth;
pub mod cache;
pub mod comments;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod media;
pub mod media_store;
pub mod metrics;
pub mod moderation;
pub mod rate_limit;
pub mod server;
pub mod slug;
pub mod tools;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{MarketError, MarketResult};
