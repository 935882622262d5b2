//! Feed resolution error types.

use wallarss_core::CacheLoadError;

use crate::wallapop::UpstreamError;

/// Errors from resolving a feed. Any one of them aborts the whole resolution.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Place lookup or search failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Fetching an item's publish date failed.
    #[error(transparent)]
    CacheLoad(#[from] CacheLoadError<UpstreamError>),
}

impl FeedError {
    /// The underlying upstream failure, wherever it surfaced.
    pub fn upstream(&self) -> &UpstreamError {
        match self {
            FeedError::Upstream(err) => err,
            FeedError::CacheLoad(err) => &err.source,
        }
    }
}
