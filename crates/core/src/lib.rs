//! Core types and shared functionality for wallarss.
//!
//! This crate provides:
//! - Expiring in-memory cache with per-key load de-duplication
//! - Layered configuration
//! - Domain model for queries, listings and resolved feeds

pub mod cache;
pub mod config;
pub mod model;

pub use cache::{CacheLoadError, Clock, ExpiringCache, Loader, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use model::{FeedItem, FeedResult, Item, ItemDetail, Location, Query};
