//! Client code for wallarss.
//!
//! This crate provides the signed marketplace API client and the feed
//! resolver that turns a saved query into dated, de-duplicated feed entries.

pub mod feed;
pub mod signature;
pub mod wallapop;

pub use feed::{FeedError, FeedResolver, FeedSettings, ItemDetailCache, ItemDetailLoader};
pub use signature::{SigningError, sign};
pub use wallapop::{
    Marketplace, NextPage, SearchRequest, UpstreamError, UpstreamErrorKind, WallapopClient, WallapopConfig,
};
