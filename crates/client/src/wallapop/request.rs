//! Query parameters for the marketplace endpoints.

use serde::Serialize;
use wallarss_core::{Location, Query};

/// Place lookup parameters for `/maps/here/place`.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceRequest<'a> {
    #[serde(rename = "placeId")]
    pub place_id: &'a str,
}

/// Search parameters for `/api/v3/general/search`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    /// Radius in meters.
    pub distance: u64,
    pub keywords: String,
    pub filters_source: String,
    pub order_by: String,
    pub min_sale_price: u32,
    pub max_sale_price: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub language: String,
}

impl SearchRequest {
    /// Newest-first search for `keywords` around `location`, with the query's radius and price bounds.
    pub fn new(query: &Query, keywords: &str, location: Location, language: &str) -> Self {
        Self {
            distance: query.radius_meters(),
            keywords: keywords.to_string(),
            filters_source: "quick_filters".into(),
            order_by: "newest".into(),
            min_sale_price: query.min_price,
            max_sale_price: query.max_price,
            latitude: location.latitude,
            longitude: location.longitude,
            language: language.to_string(),
        }
    }
}
