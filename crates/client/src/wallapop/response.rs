//! Marketplace API response types and projection into the domain model.
//!
//! Only the fields the feed uses are modelled. Anything else in the payload is
//! ignored; a missing required field fails deserialization.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::form_urlencoded;
use wallarss_core::{Item, ItemDetail, Location};

use super::UpstreamErrorKind;

/// Raw response from `/maps/here/place`.
#[derive(Debug, Deserialize)]
pub struct PlaceResponse {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<PlaceResponse> for Location {
    fn from(raw: PlaceResponse) -> Self {
        Location { latitude: raw.latitude, longitude: raw.longitude }
    }
}

/// Raw response from `/api/v3/general/search`.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub search_objects: Vec<SearchObject>,
}

/// Individual listing in a search response.
#[derive(Debug, Deserialize)]
pub struct SearchObject {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub web_slug: String,
    #[serde(default)]
    pub images: Vec<SearchImage>,
    pub user: SearchUser,
}

#[derive(Debug, Deserialize)]
pub struct SearchImage {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub medium: String,
}

impl SearchImage {
    /// Medium rendition, falling back to the original.
    fn url(self) -> Option<String> {
        [self.medium, self.original].into_iter().find(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchUser {
    #[serde(default)]
    pub micro_name: String,
}

impl From<SearchObject> for Item {
    fn from(raw: SearchObject) -> Self {
        Item {
            id: raw.id,
            title: raw.title,
            price: raw.price,
            currency: raw.currency,
            description: raw.description,
            images: raw.images.into_iter().filter_map(SearchImage::url).collect(),
            seller_name: raw.user.micro_name,
            web_slug: raw.web_slug,
        }
    }
}

impl From<SearchResponse> for Vec<Item> {
    fn from(raw: SearchResponse) -> Self {
        raw.search_objects.into_iter().map(Item::from).collect()
    }
}

/// Raw response from `/api/v3/items/{id}`.
#[derive(Debug, Deserialize)]
pub struct ItemResponse {
    pub id: String,
    pub content: ItemContent,
}

#[derive(Debug, Deserialize)]
pub struct ItemContent {
    pub modified_date: i64,
    #[serde(default)]
    pub images: Vec<ItemImage>,
}

#[derive(Debug, Deserialize)]
pub struct ItemImage {
    pub urls_by_size: ImageUrls,
}

#[derive(Debug, Deserialize)]
pub struct ImageUrls {
    #[serde(default)]
    pub big: String,
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub medium: String,
}

impl ImageUrls {
    /// Largest rendition available. `big` is served at 800px; the CDN also has it at 1024px.
    fn url(self) -> Option<String> {
        let big = match self.big.strip_suffix("800") {
            Some(stem) => format!("{stem}1024"),
            None => self.big,
        };
        [big, self.original, self.medium].into_iter().find(|url| !url.is_empty())
    }
}

impl TryFrom<ItemResponse> for ItemDetail {
    type Error = UpstreamErrorKind;

    fn try_from(raw: ItemResponse) -> Result<Self, Self::Error> {
        let millis = raw.content.modified_date;
        let images = raw.content.images.into_iter().filter_map(|image| image.urls_by_size.url()).collect();
        ItemDetail::from_epoch_millis(raw.id, millis, images)
            .ok_or_else(|| UpstreamErrorKind::Parse(format!("modified_date {millis} is out of range")))
    }
}

/// Cursor for the next search page, carried in the `X-NextPage` response header.
///
/// The header value is a ready-made query string for the same endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct NextPage {
    pub raw: String,
    pub step: u32,
    pub search_id: String,
    /// Date of the oldest listing the next page starts from.
    pub pagination_date: DateTime<Utc>,
}

impl NextPage {
    pub const HEADER: &'static str = "X-NextPage";

    pub fn parse(raw: &str) -> Result<Self, UpstreamErrorKind> {
        let mut step = None;
        let mut search_id = String::new();
        let mut pagination_date = None;
        for (name, value) in form_urlencoded::parse(raw.as_bytes()) {
            match name.as_ref() {
                "step" => step = value.parse::<u32>().ok(),
                "search_id" => search_id = value.into_owned(),
                "pagination_date" => {
                    pagination_date = DateTime::parse_from_rfc3339(&value).ok().map(|date| date.with_timezone(&Utc));
                }
                _ => {}
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            step: step.ok_or_else(|| UpstreamErrorKind::Parse("can't parse step from next page".into()))?,
            search_id,
            pagination_date: pagination_date
                .ok_or_else(|| UpstreamErrorKind::Parse("can't parse pagination_date from next page".into()))?,
        })
    }
}
