//! Feed resolution: search, de-duplicate, date and format listings for one query.
//!
//! Publish dates and full-size images come from the item detail endpoint. Details
//! are memoized in an [`ExpiringCache`] owned by whoever composes the resolver, so
//! repeated renders of the same feed only fetch details for listings they have not
//! seen within the TTL.
//!
//! Each distinct keyword is searched on its own. The first occurrence of an item id
//! wins; later occurrences, from the same or a later search, are dropped.
//! There is no partial mode: if any call fails the whole resolution fails.

pub mod error;
pub mod format;

pub use error::FeedError;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use wallarss_core::{AppConfig, ExpiringCache, FeedItem, FeedResult, ItemDetail, Loader, Query};

use crate::wallapop::{Marketplace, SearchRequest, UpstreamError};

/// Loads an item's detail from the marketplace.
pub struct ItemDetailLoader<M> {
    market: Arc<M>,
}

impl<M> ItemDetailLoader<M> {
    pub fn new(market: Arc<M>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl<M: Marketplace> Loader<String, ItemDetail> for ItemDetailLoader<M> {
    type Error = UpstreamError;

    async fn load(&self, item_id: &String) -> Result<ItemDetail, UpstreamError> {
        self.market.item_detail(item_id).await
    }
}

/// Item id to detail cache shared across resolutions.
pub type ItemDetailCache<M> = ExpiringCache<String, ItemDetail, ItemDetailLoader<M>>;

/// Settings the resolver needs beyond the query itself.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Base for item links and the feed link.
    pub site_url: String,
    pub language: String,
}

impl From<&AppConfig> for FeedSettings {
    fn from(config: &AppConfig) -> Self {
        Self { site_url: config.site_url.trim_end_matches('/').to_string(), language: config.language.clone() }
    }
}

/// Resolves queries into feeds.
pub struct FeedResolver<M: Marketplace> {
    market: Arc<M>,
    details: Arc<ItemDetailCache<M>>,
    settings: FeedSettings,
}

impl<M: Marketplace> FeedResolver<M> {
    pub fn new(market: Arc<M>, details: Arc<ItemDetailCache<M>>, settings: FeedSettings) -> Self {
        Self { market, details, settings }
    }

    /// Build a detail cache backed by `market`'s item detail call.
    pub fn detail_cache(market: Arc<M>, ttl: Duration) -> ItemDetailCache<M> {
        ExpiringCache::new(ItemDetailLoader::new(market), ttl)
    }

    pub fn detail_cache_handle(&self) -> &Arc<ItemDetailCache<M>> {
        &self.details
    }

    /// Resolve `query` into a feed.
    ///
    /// # Errors
    ///
    /// Returns `FeedError` on the first failed place lookup, search, or detail load.
    pub async fn resolve(&self, query: &Query) -> Result<FeedResult, FeedError> {
        let location = self.market.location(&query.location_name).await?;
        tracing::debug!(place = %query.location_name, ?location, "resolved location");

        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for keyword in query.distinct_keywords() {
            let req = SearchRequest::new(query, keyword, location, &self.settings.language);
            for item in self.market.search(&req).await? {
                if !seen.insert(item.id.clone()) {
                    continue;
                }
                if query.ignores_description(&item.description) {
                    tracing::debug!(id = %item.id, "ignoring item");
                    continue;
                }

                let detail = self.details.get(&item.id).await?;
                items.push(FeedItem {
                    title: format::item_title(&item),
                    link: format::item_link(&self.settings.site_url, &item),
                    description: format::item_description(&item, &detail),
                    author: item.seller_name,
                    id: item.id,
                    published: detail.modified_at,
                });
            }
        }

        let build_date = items.first().map_or_else(Utc::now, |item| item.published);
        tracing::info!(keywords = ?query.keywords, items = items.len(), %build_date, "resolved feed");

        Ok(FeedResult {
            title: format::feed_title(query),
            link: self.settings.site_url.clone(),
            description: format::FEED_DESCRIPTION.to_string(),
            build_date,
            items,
        })
    }
}
