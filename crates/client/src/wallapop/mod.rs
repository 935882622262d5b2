//! Wallapop marketplace API client.
//!
//! Issues signed GET requests and projects the JSON bodies into the domain model.
//!
//! ### Protocol
//!
//! - **Endpoints**:
//!   - place lookup: `{site}/maps/here/place?placeId=...`
//!   - search: `{api}/api/v3/general/search?...`, paged through the `X-NextPage`
//!     response header, whose value is the query string of the next page
//!   - item detail: `{api}/api/v3/items/{id}`, the id escaped as one path segment
//! - **Authentication**: `Timestamp` (epoch millis) and `X-Signature` headers on
//!   every call, see [`crate::signature`]. The same timestamp value is signed and sent.
//! - **Failures**: network errors, non-2xx statuses and malformed bodies all surface
//!   as [`UpstreamError`] tagged with the operation name. Nothing is retried.

pub mod error;
pub mod request;
pub mod response;

pub use error::{UpstreamError, UpstreamErrorKind};
pub use request::{PlaceRequest, SearchRequest};
pub use response::NextPage;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{self, HeaderMap};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;
use wallarss_core::{AppConfig, Item, ItemDetail, Location};

use crate::signature;

const NO_PARAMS: &[(&str, &str)] = &[];

/// Upstream operations the feed resolver depends on.
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Resolve a place name to coordinates.
    async fn location(&self, place: &str) -> Result<Location, UpstreamError>;

    /// Run one search and return its listings in upstream order.
    async fn search(&self, req: &SearchRequest) -> Result<Vec<Item>, UpstreamError>;

    /// Fetch a single listing's detail.
    async fn item_detail(&self, item_id: &str) -> Result<ItemDetail, UpstreamError>;
}

/// Marketplace client configuration.
#[derive(Debug, Clone)]
pub struct WallapopConfig {
    /// Public website (place lookups live here).
    pub site_url: String,
    /// API host; stripped from URLs before signing.
    pub api_url: String,
    pub user_agent: String,
    pub signing_key: String,
    pub timeout: Duration,
    /// Stop following search pages once they start before `now - search_max_age`.
    pub search_max_age: Duration,
    pub search_max_pages: u32,
}

impl Default for WallapopConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for WallapopConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            site_url: normalize_base(&config.site_url),
            api_url: normalize_base(&config.api_url),
            user_agent: config.user_agent.clone(),
            signing_key: config.signing_key.clone(),
            timeout: config.timeout(),
            search_max_age: config.search_max_age(),
            search_max_pages: config.search_max_pages,
        }
    }
}

/// Base URL in the form `Url` serializes request URLs (lowercase host, no default port),
/// without a trailing slash, so signed paths strip cleanly.
fn normalize_base(raw: &str) -> String {
    let normalized = Url::parse(raw).map(String::from).unwrap_or_else(|_| raw.to_string());
    normalized.trim_end_matches('/').to_string()
}

/// Signed HTTP client for the marketplace API.
#[derive(Debug, Clone)]
pub struct WallapopClient {
    http: reqwest::Client,
    config: WallapopConfig,
}

impl WallapopClient {
    /// Create a new client with the given configuration.
    pub fn new(config: WallapopConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::new("client", e))?;

        Ok(Self { http, config })
    }

    fn url(operation: &'static str, raw: &str) -> Result<Url, UpstreamError> {
        Url::parse(raw).map_err(|e| UpstreamError::new(operation, UpstreamErrorKind::InvalidUrl(e.to_string())))
    }

    fn api_v3(&self, operation: &'static str, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = Self::url(operation, &format!("{}/api/v3", self.config.api_url))?;
        let invalid = || UpstreamErrorKind::InvalidUrl(format!("{} has no path", self.config.api_url));
        url.path_segments_mut().map_err(|()| UpstreamError::new(operation, invalid()))?.extend(segments);
        Ok(url)
    }

    /// Signed GET of `url` with `params`, decoding the JSON body into `T`.
    pub async fn get_json<T, P>(&self, operation: &'static str, url: Url, params: &P) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.get_with_headers(operation, url, params).await.map(|(body, _)| body)
    }

    /// Like [`Self::get_json`], also handing back the response headers.
    async fn get_with_headers<T, P>(
        &self,
        operation: &'static str,
        url: Url,
        params: &P,
    ) -> Result<(T, HeaderMap), UpstreamError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let path = signature::signed_path(url.as_str(), &self.config.api_url);
        let signature = signature::sign(self.config.signing_key.as_bytes(), "get", path, &timestamp)
            .map_err(|e| UpstreamError::new(operation, e))?;

        let start = Instant::now();
        let response = self
            .http
            .get(url.clone())
            .header(header::USER_AGENT, &self.config.user_agent)
            .header("Timestamp", &timestamp)
            .header("X-Signature", &signature)
            .query(params)
            .send()
            .await
            .map_err(|e| UpstreamError::new(operation, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| UpstreamError::new(operation, e))?;

        tracing::debug!(%url, operation, status = status.as_u16(), elapsed = ?start.elapsed(), "HTTP GET");

        if !status.is_success() {
            tracing::warn!(
                %url,
                operation,
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&bytes),
                "bad upstream response"
            );
            return Err(UpstreamError::new(operation, UpstreamErrorKind::Status { status: status.as_u16() }));
        }

        let body = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(%url, operation, error = %e, "malformed upstream body");
            UpstreamError::new(operation, UpstreamErrorKind::Parse(e.to_string()))
        })?;

        Ok((body, headers))
    }
}

/// Cursor from the response headers, if the upstream offered another page.
fn next_page(headers: &HeaderMap) -> Result<Option<NextPage>, UpstreamError> {
    let Some(value) = headers.get(NextPage::HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|e| UpstreamError::new("search", UpstreamErrorKind::Parse(e.to_string())))?;
    if raw.is_empty() {
        return Ok(None);
    }
    NextPage::parse(raw).map(Some).map_err(|kind| UpstreamError::new("search", kind))
}

#[async_trait]
impl Marketplace for WallapopClient {
    async fn location(&self, place: &str) -> Result<Location, UpstreamError> {
        let url = Self::url("location", &format!("{}/maps/here/place", self.config.site_url))?;
        let raw: response::PlaceResponse = self.get_json("location", url, &PlaceRequest { place_id: place }).await?;
        Ok(raw.into())
    }

    /// Follows `X-NextPage` cursors until a page starts before the age limit,
    /// the upstream stops offering one, or `search_max_pages` pages were read.
    async fn search(&self, req: &SearchRequest) -> Result<Vec<Item>, UpstreamError> {
        let url = self.api_v3("search", &["general", "search"])?;
        let oldest = TimeDelta::from_std(self.config.search_max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut items = Vec::new();
        let mut cursor: Option<NextPage> = None;
        for page in 1..=self.config.search_max_pages {
            let (raw, headers): (response::SearchResponse, _) = match &cursor {
                None => self.get_with_headers("search", url.clone(), req).await?,
                Some(next) => {
                    let mut url = url.clone();
                    url.set_query(Some(&next.raw));
                    self.get_with_headers("search", url, NO_PARAMS).await?
                }
            };
            let found = raw.search_objects.len();
            items.extend(Vec::<Item>::from(raw));
            tracing::debug!(keywords = %req.keywords, page, found, "search page");

            cursor = match next_page(&headers)? {
                Some(next) if next.pagination_date >= oldest => Some(next),
                _ => break,
            };
        }

        tracing::debug!(keywords = %req.keywords, results = items.len(), "search completed");
        Ok(items)
    }

    async fn item_detail(&self, item_id: &str) -> Result<ItemDetail, UpstreamError> {
        let url = self.api_v3("item_detail", &["items", item_id])?;
        let raw: response::ItemResponse = self.get_json("item_detail", url, NO_PARAMS).await?;
        ItemDetail::try_from(raw).map_err(|kind| UpstreamError::new("item_detail", kind))
    }
}
